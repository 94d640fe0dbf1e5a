use prometheus::{IntGauge, Opts};

use nodeprism_core::error::Result;

/// `nodeprism_build_info` constant gauge, set to 1.
pub fn version_collector() -> Result<Box<dyn prometheus::core::Collector>> {
    let info = IntGauge::with_opts(
        Opts::new(
            "nodeprism_build_info",
            "A metric with a constant '1' value labeled by version, os and arch of the exporter build.",
        )
        .const_label("version", env!("CARGO_PKG_VERSION"))
        .const_label("os", std::env::consts::OS)
        .const_label("arch", std::env::consts::ARCH),
    )?;
    info.set(1);
    Ok(Box::new(info))
}
