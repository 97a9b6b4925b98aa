// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Cat, Init, Ls, Stat, Version};

#[cfg(feature = "fuse")]
use cli::Mount;

#[cfg(feature = "fuse")]
command_enum! {
    (Cat, Cat),
    (Init, Init),
    (Ls, Ls),
    (Mount, Mount),
    (Stat, Stat),
    (Version, Version),
}

#[cfg(not(feature = "fuse"))]
command_enum! {
    (Cat, Cat),
    (Init, Init),
    (Ls, Ls),
    (Stat, Stat),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let ctx = cli::op::OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
