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

use crate::cmd_apply_mask::{apply_mask, ApplyMaskArgs};
use crate::cmd_batches::{write_batches, BatchesArgs};
use crate::cmd_extract::{extract_chips, ExtractArgs};
use crate::cmd_random_window::{random_windows, RandomWindowArgs};

mod cmd_apply_mask;
mod cmd_batches;
mod cmd_extract;
mod cmd_random_window;

#[derive(StructOpt)]
struct Cli {

    #[structopt(long, default_value = "Warn")]
    log_level: LevelFilter,

    #[structopt(subcommand)]  // Note that we mark a field as a subcommand
    cmd: Command
}

#[derive(StructOpt)]
enum Command {
    #[structopt(help="Cuts a GeoTIFF chip per polygon, plus a csv manifest")]
    Extract(ExtractArgs),

    #[structopt(help="Writes training batches, stratified over the images or sequential")]
    Batches(BatchesArgs),

    #[structopt(help="Cuts randomly placed fixed size windows out of one image")]
    RandomWindow(RandomWindowArgs),

    #[structopt(help="Zeroes the pixels of an image wherever a mask raster is 0")]
    ApplyMask(ApplyMaskArgs),
}

fn run() -> Result<()> {
    let args = Cli::from_args();

    SimpleLogger::new().with_level(args.log_level).init()?;

    match &args.cmd {
        Command::Extract(r) => {
            extract_chips(r)?;
        },
        Command::Batches(r) => {
            write_batches(r)?;
        },
        Command::RandomWindow(r) => {
            random_windows(r)?;
        },
        Command::ApplyMask(r) => {
            apply_mask(r)?;
        }
    }

    Ok(())
}

fn main() {
    run().unwrap();
}
