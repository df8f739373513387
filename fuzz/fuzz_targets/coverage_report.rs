#![no_main]

use droidstudy::analysis::ReportParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(parser) = ReportParser::new() else {
        return;
    };
    if let Ok(input) = std::str::from_utf8(data) {
        // Neither the HTML total nor the runtime line may panic
        let _ = parser.html_coverage(input);
        let _ = parser.runtime_seconds(input);
    }
});
