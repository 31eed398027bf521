/*
This file is part of the Chip Extraction Tool
Copyright (C) 2022 Novel-T

The Chip Extraction Tool is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use log::info;
use postgis::ewkb;
use postgres::{Client, NoTls};
use structopt::StructOpt;

use crate::export::{campaign_feature, write_feature_collection};
use ml_util::util::format_duration;

#[derive(StructOpt)]
pub struct TargetGeojsonArgs {
    #[structopt(long, env = "CAMPAIGN_DB_URL", hide_env_values = true)]
    pub(crate) pg_conn_str: String,

    #[structopt(long, help="Schema holding the campaign tables")]
    pub(crate) schema: String,

    #[structopt(long, help="Catalog id of the image the features were digitized on")]
    pub(crate) catalog_id: String,

    #[structopt(long, help="At most this many features, least reviewed first")]
    pub(crate) max_number: i64,

    #[structopt(long, default_value = "1.0", help="Only features at or below this score, unscored ones always come")]
    pub(crate) max_score: f64,

    #[structopt(long, default_value = "0", help="Only features with at most this many votes")]
    pub(crate) max_votes: i32,

    #[structopt(long, parse(from_os_str))]
    pub(crate) output: PathBuf,
}

/// Exports the features the crowd has seen the least, the next ones
/// worth reviewing.  The class comes per row from the tag type
pub fn export_target_geojson(args: &TargetGeojsonArgs) -> Result<()> {
    let now = Instant::now();

    let mut client = Client::connect(&args.pg_conn_str, NoTls)?;

    let query = format!(
        "SELECT feature.id::text, tag_type.name, feature.feature \
         FROM {SCHEMA}.feature \
         JOIN {SCHEMA}.tag_type ON feature.type_id = tag_type.id \
         JOIN {SCHEMA}.overlay ON feature.overlay_id = overlay.id \
         WHERE overlay.catalogid = $1 \
           AND (feature.score <= $2 OR feature.score IS NULL) \
           AND feature.num_votes_total <= $3 \
         ORDER BY feature.score ASC NULLS FIRST \
         LIMIT {LIMIT}",
        SCHEMA = args.schema,
        LIMIT = args.max_number,
    );

    let rows = client.query(
        query.as_str(),
        &[&args.catalog_id, &args.max_score, &args.max_votes],
    )?;

    info!("Query returned {} features", rows.len());

    let mut features = Vec::with_capacity(rows.len());

    for row in &rows {
        let feature_id: String = row.try_get(0)?;
        let class_name: String = row.try_get(1)?;
        let polygon: ewkb::Polygon = row.try_get(2)?;

        if let Some(feature) =
            campaign_feature(&polygon, &feature_id, &class_name, &args.catalog_id)
        {
            features.push(feature);
        }
    }

    let num_features = features.len();

    write_feature_collection(&args.output, features)?;

    println!(
        "Wrote {} target features to {:?} in {}",
        num_features,
        &args.output,
        format_duration(now.elapsed())
    );

    Ok(())
}
