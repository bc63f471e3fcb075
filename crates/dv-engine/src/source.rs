//! Where drum sounds come from.

use dv_ir::Sample;

use crate::error::SampleLoadError;

/// Supplies the sample for a drum pitch.
pub trait SampleSource {
    fn load(&mut self, pitch: u8) -> Result<Sample, SampleLoadError>;
}

impl<F> SampleSource for F
where
    F: FnMut(u8) -> Result<Sample, SampleLoadError>,
{
    fn load(&mut self, pitch: u8) -> Result<Sample, SampleLoadError> {
        self(pitch)
    }
}
