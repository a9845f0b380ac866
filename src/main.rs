// NØNOS Operating System
// Copyright (C) 2026 NØNOS Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use nonos_mkimage::blueprint::Blueprint;
use nonos_mkimage::image::Image;
use nonos_mkimage::logging;

#[derive(Debug, Parser)]
#[command(
    name = "nonos-mkimage",
    version,
    about = "NONOS boot image builder - pack an ARM kernel, modules and loader metadata into a self-decompressing ELF"
)]
struct Args {
    /// Output boot image.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Blueprint describing the image contents.
    #[arg(value_name = "BLUEPRINT")]
    blueprint: PathBuf,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    verbose: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("nonos-mkimage: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    logging::init(args.verbose).context("logger already installed")?;

    let blueprint = Blueprint::parse_file(&args.blueprint)
        .with_context(|| format!("parsing blueprint {}", args.blueprint.display()))?;

    let image = Image::build(&blueprint).context("image build failed")?;

    image
        .write_elf(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    Ok(())
}
