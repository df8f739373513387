#![no_main]

use droidstudy::analysis::filtered_instruction_totals;
use droidstudy::config::AnalysisConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let aliases = AnalysisConfig::default().package_aliases;
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(totals) = filtered_instruction_totals(input, &aliases) {
            let _ = totals.percentage();
        }
    }
});
