#![no_main]

use libfuzzer_sys::fuzz_target;
use scmp_pfc::config::FilterConfig;

fuzz_target!(|data: &[u8]| {
    // Any description that compiles must also render
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(db) = FilterConfig::from_toml_str(input).and_then(|config| config.build()) {
            let _ = scmp_pfc::to_pfc_string(&db);
        }
    }
});
