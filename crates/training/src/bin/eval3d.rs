use clap::Parser;
use training::cli::{eval3d_from_args, Eval3dArgs};

fn main() -> anyhow::Result<()> {
    let args = Eval3dArgs::parse();
    eval3d_from_args(args)
}
