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
use anyhow::Result;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use structopt::StructOpt;

use crate::cmd_target_geojson::{export_target_geojson, TargetGeojsonArgs};
use crate::cmd_train_geojson::{export_train_geojson, TrainGeojsonArgs};

mod cmd_target_geojson;
mod cmd_train_geojson;
mod export;

#[derive(StructOpt)]
struct Cli {

    #[structopt(long, default_value = "Warn")]
    log_level: LevelFilter,

    #[structopt(subcommand)]  // Note that we mark a field as a subcommand
    cmd: Command
}

#[derive(StructOpt)]
enum Command {
    #[structopt(help="Exports high confidence campaign features of one class as training GeoJSON")]
    TrainGeojson(TrainGeojsonArgs),

    #[structopt(help="Exports the least reviewed campaign features as target GeoJSON")]
    TargetGeojson(TargetGeojsonArgs),
}

fn run() -> Result<()> {
    let args = Cli::from_args();

    SimpleLogger::new().with_level(args.log_level).init()?;

    match &args.cmd {
        Command::TrainGeojson(r) => {
            export_train_geojson(r)?;
        },
        Command::TargetGeojson(r) => {
            export_target_geojson(r)?;
        }
    }

    Ok(())
}

fn main() {
    run().unwrap();
}
