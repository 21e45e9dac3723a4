mod app;
mod config;
mod error;
mod input;
mod logging;
mod model;
mod render;
mod sim;
mod storage;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
