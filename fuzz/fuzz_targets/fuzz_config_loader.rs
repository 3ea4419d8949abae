#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Fuzz TOML parsing of Config and ensure it never panics and rejects
    // invalids gracefully. Both parse errors and validation errors are
    // acceptable outcomes; panics are not.
    let parsed = toml::from_str::<rts_config::Config>(data);
    match parsed {
        Ok(cfg) => {
            let _ = cfg.validate();
        }
        Err(_e) => {
            // parse error is acceptable
        }
    }
});
