use super::TypeMapping;
use crate::driver::NativeValue;
use crate::params::BoundParameter;

/// Size handed to the driver for values longer than the inline maximum.
pub const UNBOUNDED_PARAMETER_SIZE: u32 = 0;

impl TypeMapping {
    /// Set the native type tag and, for strings and binaries, the parameter size.
    ///
    /// Values that fit the clamp bind with the clamp as their size so repeated
    /// executions share one statement shape; longer values bind unbounded.
    pub fn configure_parameter(&self, parameter: &mut BoundParameter, value: &NativeValue) {
        parameter.provider_type = self.provider_type();
        parameter.size = self.max_specific_size().map(|clamp| {
            let fits = value
                .length()
                .is_none_or(|len| u32::try_from(len).is_ok_and(|len| len <= clamp));
            if value.is_null() || fits {
                clamp
            } else {
                UNBOUNDED_PARAMETER_SIZE
            }
        });
    }
}
