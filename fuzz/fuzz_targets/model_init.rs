#![no_main]

use libfuzzer_sys::fuzz_target;
use gssk_core::model::ModelSpec;

// Arbitrary bytes must never panic the builder: they either build or
// produce a configuration/validation error.
fuzz_target!(|data: &[u8]| {
    if let Ok(spec) = ModelSpec::from_slice(data) {
        if let Ok(mut kernel) = spec.build() {
            assert_eq!(kernel.state().len(), kernel.state_size());
            let _ = kernel.step_default();
        }
    }
});
