fn main() {
    // Propagate ESP-IDF build metadata when building for the device.
    // Host builds (tests) skip this — the espidf feature is off.
    if std::env::var("CARGO_FEATURE_ESPIDF").is_ok() {
        embuild::espidf::sysenv::output();
    }
}
