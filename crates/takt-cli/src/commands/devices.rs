//! Audio device listing.

use clap::Args;
use takt_audio::list_devices;

/// Arguments for `takt devices`.
#[derive(Args)]
pub struct DevicesArgs {}

/// Print every audio device with its capabilities.
pub fn run(_args: DevicesArgs) -> anyhow::Result<()> {
    let devices = list_devices()?;
    if devices.is_empty() {
        println!("no audio devices found");
        return Ok(());
    }

    let name_len = devices.iter().map(|d| d.name.len()).max().unwrap_or(0);
    println!("available devices:");
    for (index, device) in devices.iter().enumerate() {
        let io = match (device.is_input, device.is_output) {
            (true, true) => "in+out",
            (true, false) => "in",
            (false, true) => "out",
            (false, false) => "-",
        };
        println!(
            "  {index:>2}. {:name_len$}  {:>6}  {:.1} kHz",
            device.name,
            io,
            f64::from(device.default_sample_rate) / 1000.0,
        );
    }
    Ok(())
}
