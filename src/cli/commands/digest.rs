//! Single-file payload digest command.

use std::path::Path;
use std::process::ExitCode;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::{self, FlacCheck, PayloadDigest};
use crate::model::Format;

/// Print the payload digest of `file`, or with `verify` check its decoded
/// audio against the declared signature.
pub fn cmd_digest(
    file: &Path,
    format: Option<Format>,
    verify: bool,
    config: &Config,
) -> anyhow::Result<ExitCode> {
    let silent = config.logging.is_silent();

    if verify {
        let check = verify_file(file, format)?;
        if !silent {
            print_check(file, &check);
        }
        return Ok(if check.is_consistent() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let (digest, format) = digest_file(file, format)?;
    if !silent {
        println!("{digest}  {format}  {}", file.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// Digest `file` as `format`, or as the format its extension names.
pub(crate) fn digest_file(file: &Path, format: Option<Format>) -> Result<(PayloadDigest, Format)> {
    let format = resolve_format(file, format)?;
    Ok((extract::extract(file, format)?, format))
}

/// Decode `file` and compare its audio with the declared signature.
pub(crate) fn verify_file(file: &Path, format: Option<Format>) -> Result<FlacCheck> {
    match resolve_format(file, format)? {
        Format::Flac => Ok(extract::verify_flac(file)?),
        other => Err(Error::invalid_format(format!(
            "{} is {other}; only flac declares a signature to verify",
            file.display()
        ))),
    }
}

fn resolve_format(file: &Path, format: Option<Format>) -> Result<Format> {
    if !file.is_file() {
        return Err(Error::not_found(file));
    }

    match format {
        Some(format) => Ok(format),
        None => Format::from_path(file).ok_or_else(|| {
            Error::invalid_format(format!(
                "cannot infer format of {}, pass --format",
                file.display()
            ))
        }),
    }
}

fn print_check(file: &Path, check: &FlacCheck) {
    let declared = check
        .declared
        .map_or_else(|| "unset".to_string(), |digest| digest.to_hex());
    println!("{}", file.display());
    println!("  declared: {declared}");
    println!("  decoded:  {}", check.decoded);
    if check.is_consistent() {
        println!("  ✓ Audio matches");
    } else {
        println!("  ✗ Audio does not match the declared signature");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;
    use crate::test_utils::{
        FLAC_SIGNATURE_RANGE, GOOD_FLAC_SIGNATURE, GOOD_MP3_PAYLOAD_DIGEST,
        VERBATIM_FLAC_PCM_DIGEST, fixture_path, write_file,
    };

    #[test]
    fn test_format_inferred_from_extension() {
        let (digest, format) = digest_file(&fixture_path("track.flac"), None).unwrap();
        assert_eq!(format, Format::Flac);
        assert_eq!(digest.to_hex(), GOOD_FLAC_SIGNATURE);

        let (digest, format) =
            digest_file(&fixture_path("id3v24_footer_extended.mp3"), None).unwrap();
        assert_eq!(format, Format::Mp3);
        assert_eq!(digest.to_hex(), GOOD_MP3_PAYLOAD_DIGEST);
    }

    #[test]
    fn test_explicit_format_wins() {
        // No ID3 tags to strip, so the whole file is the payload
        let (_, format) = digest_file(&fixture_path("track.flac"), Some(Format::Mp3)).unwrap();
        assert_eq!(format, Format::Mp3);

        let err = digest_file(&fixture_path("id3v1.mp3"), Some(Format::Flac)).unwrap_err();
        assert!(matches!(err, Error::Extract(ExtractError::Unsupported { .. })));
    }

    #[test]
    fn test_unknown_extension_needs_format() {
        let dir = tempfile::tempdir().unwrap();
        let notes = write_file(dir.path(), "notes.txt", b"hello");
        let err = digest_file(&notes, None).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = digest_file(Path::new("missing/track.flac"), None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_verify_intact_flac() {
        let check = verify_file(&fixture_path("verbatim.flac"), None).unwrap();
        assert!(check.is_consistent());
        assert_eq!(check.decoded.to_hex(), VERBATIM_FLAC_PCM_DIGEST);
    }

    #[test]
    fn test_verify_detects_altered_signature() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = std::fs::read(fixture_path("verbatim.flac")).unwrap();
        bytes[FLAC_SIGNATURE_RANGE.start] ^= 0x80;
        let path = write_file(dir.path(), "altered.flac", &bytes);

        let check = verify_file(&path, None).unwrap();
        assert!(!check.is_consistent());

        let exit = cmd_digest(&path, None, true, &Config::default()).unwrap();
        assert_eq!(format!("{exit:?}"), format!("{:?}", ExitCode::FAILURE));
    }

    #[test]
    fn test_verify_rejects_mp3() {
        let err = verify_file(&fixture_path("id3v1.mp3"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_silent_digest_still_succeeds() {
        let mut config = Config::default();
        config.logging.level = crate::config::LoggingConfig::SILENT.to_string();
        let exit = cmd_digest(&fixture_path("verbatim.flac"), None, true, &config).unwrap();
        assert_eq!(format!("{exit:?}"), format!("{:?}", ExitCode::SUCCESS));
    }
}
