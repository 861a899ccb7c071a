//! Shared helpers for format round-trip tests

use crate::FrostFormat;
use std::fmt::Debug;

/// Build `original`, parse the bytes back and compare
pub fn test_round_trip<T>(original: &T) -> Result<(), Box<dyn std::error::Error>>
where
    T: FrostFormat + PartialEq + Debug,
{
    let data = original.build()?;
    let parsed = T::parse(&data)?;

    if original != &parsed {
        return Err(format!(
            "Round-trip verification failed:\nOriginal: {:?}\nParsed: {:?}",
            original, parsed
        )
        .into());
    }

    Ok(())
}

/// Expect `invalid_data` to be rejected by the parser
pub fn test_invalid_data_rejected<T>(invalid_data: &[u8]) -> Result<(), Box<dyn std::error::Error>>
where
    T: FrostFormat,
{
    match T::parse(invalid_data) {
        Ok(_) => Err("Expected parsing to fail for invalid data, but it succeeded".into()),
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::CasCatalog;
    use crate::toc::TocFile;

    #[test]
    fn test_invalid_data_rejected_utility() {
        test_invalid_data_rejected::<CasCatalog>(b"short").expect("bad signature rejected");
        test_invalid_data_rejected::<TocFile>(&[0x9E]).expect("unknown tag rejected");
    }
}
