#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::init();
    solarcanopy::run_native()
}

// The browser build starts from `solarcanopy::start`.
#[cfg(target_arch = "wasm32")]
fn main() {}
