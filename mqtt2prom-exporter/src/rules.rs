//! Mapping rules from decoded reports to gauge updates.
//!
//! Device series are labelled `(device id, report prefix)`. Indexed relay
//! channels append their index to the device id (`plug1`, `plug2`, ...).
//!
//! STATE on/off values and SENSOR wattage share the `Power` family and its
//! label space, so whichever report arrived last determines the value.

use mqtt2prom_common::{DeviceState, EnergyReading};

use crate::collector::MetricSink;
use crate::family::GaugeFamily;

/// Apply a device-state report. Returns the number of gauge updates issued.
pub fn apply_state<S: MetricSink + ?Sized>(
    sink: &S,
    state: &DeviceState,
    device: &str,
    prefix: &str,
) -> usize {
    sink.set_gauge(GaugeFamily::Vcc, (device, prefix), state.vcc);
    sink.set_gauge(GaugeFamily::Rssi, (device, prefix), state.wifi.rssi as f64);
    let mut updates = 2;

    for channel in state.power_channels() {
        if let Some(value) = channel.value() {
            let name = format!("{}{}", device, channel.suffix);
            sink.set_gauge(GaugeFamily::Power, (name.as_str(), prefix), value);
            updates += 1;
        }
    }

    updates
}

/// Apply an energy-sensor report. Returns the number of gauge updates issued.
///
/// `Total` receives the energy used today, not the all-time total.
pub fn apply_sensor<S: MetricSink + ?Sized>(
    sink: &S,
    reading: &EnergyReading,
    device: &str,
    prefix: &str,
) -> usize {
    let energy = &reading.energy;

    sink.set_gauge(GaugeFamily::Current, (device, prefix), energy.current);
    sink.set_gauge(GaugeFamily::Voltage, (device, prefix), energy.voltage as f64);
    sink.set_gauge(GaugeFamily::Power, (device, prefix), energy.power as f64);
    sink.set_gauge(GaugeFamily::Total, (device, prefix), energy.today);

    4
}

/// Apply a scalar environmental reading.
pub fn apply_scalar<S: MetricSink + ?Sized>(
    sink: &S,
    family: GaugeFamily,
    location: &str,
    place: &str,
    value: f64,
) -> usize {
    sink.set_gauge(family, (location, place), value);
    1
}
