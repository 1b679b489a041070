mod app;
mod connection;
mod control_loop;
#[cfg(feature = "esp32")]
mod esp;
#[cfg(not(feature = "esp32"))]
mod host;
mod listener;
mod scheduler;

#[cfg(not(feature = "esp32"))]
fn main() -> anyhow::Result<()> {
    host::run()
}

#[cfg(feature = "esp32")]
fn main() -> anyhow::Result<()> {
    esp::run()
}
