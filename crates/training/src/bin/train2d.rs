use clap::Parser;
use training::cli::{train2d_from_args, Train2dArgs};

fn main() -> anyhow::Result<()> {
    let args = Train2dArgs::parse();
    train2d_from_args(args)
}
