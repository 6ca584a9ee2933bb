//! Conversion argument builder
//!
//! Pure mapping from a `ConversionOptions` record to the exact argv for
//! the OCR tool. No I/O; identical input always yields the identical,
//! order-stable sequence, so the mapping is testable in isolation.

use std::ffi::OsString;
use std::path::Path;

use super::types::{ConversionOptions, VALID_OPTIMIZE_LEVELS};

/// Build the argument list for one conversion attempt.
///
/// Argument order is fixed: output kind, jobs, languages, the boolean
/// flag block, the optimization level (only when it is in the tool's
/// valid set; other values are silently omitted), signature
/// invalidation, then the input and output paths.
pub fn build_args(input: &Path, output: &Path, options: &ConversionOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--output-type".into(),
        options.output_kind.as_flag_value().into(),
        "--jobs".into(),
        options.jobs.to_string().into(),
        "-l".into(),
        options.languages.join("+").into(),
    ];

    if options.deskew {
        args.push("--deskew".into());
    }
    if options.fast_web_view {
        args.push("--fast-web-view".into());
    }
    if options.rotate_pages {
        args.push("--rotate-pages".into());
    }
    if options.skip_text {
        args.push("--skip-text".into());
    }
    if options.redo_ocr {
        args.push("--redo-ocr".into());
    }
    if options.force_ocr {
        args.push("--force-ocr".into());
    }
    if VALID_OPTIMIZE_LEVELS.contains(&options.optimize) {
        args.push("--optimize".into());
        args.push(options.optimize.to_string().into());
    }
    if options.invalidate_signatures {
        args.push("--invalidate-digital-signatures".into());
    }

    args.push(input.as_os_str().to_os_string());
    args.push(output.as_os_str().to_os_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::types::OutputKind;
    use std::path::PathBuf;

    fn as_strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_options_produce_minimal_argv() {
        let input = PathBuf::from("/tmp/in.pdf");
        let output = PathBuf::from("/tmp/out.pdf");
        let args = build_args(&input, &output, &ConversionOptions::default());

        assert_eq!(
            as_strings(&args),
            vec![
                "--output-type",
                "pdfa",
                "--jobs",
                "4",
                "-l",
                "eng",
                "--optimize",
                "0",
                "/tmp/in.pdf",
                "/tmp/out.pdf",
            ]
        );
    }

    #[test]
    fn boolean_flags_appear_only_when_set() {
        let options = ConversionOptions {
            deskew: true,
            rotate_pages: true,
            force_ocr: true,
            invalidate_signatures: true,
            output_kind: OutputKind::Pdf,
            ..Default::default()
        };

        let args = as_strings(&build_args(
            Path::new("in.pdf"),
            Path::new("out.pdf"),
            &options,
        ));

        assert!(args.contains(&"--deskew".to_string()));
        assert!(args.contains(&"--rotate-pages".to_string()));
        assert!(args.contains(&"--force-ocr".to_string()));
        assert!(args.contains(&"--invalidate-digital-signatures".to_string()));
        assert!(!args.contains(&"--fast-web-view".to_string()));
        assert!(!args.contains(&"--skip-text".to_string()));
        assert!(!args.contains(&"--redo-ocr".to_string()));
    }

    #[test]
    fn out_of_range_optimize_level_is_omitted() {
        let options = ConversionOptions {
            optimize: 7,
            ..Default::default()
        };
        let args = as_strings(&build_args(
            Path::new("in.pdf"),
            Path::new("out.pdf"),
            &options,
        ));
        assert!(!args.contains(&"--optimize".to_string()));

        let options = ConversionOptions {
            optimize: 3,
            ..Default::default()
        };
        let args = as_strings(&build_args(
            Path::new("in.pdf"),
            Path::new("out.pdf"),
            &options,
        ));
        let idx = args.iter().position(|a| a == "--optimize").unwrap();
        assert_eq!(args[idx + 1], "3");
    }

    #[test]
    fn languages_are_joined_in_caller_order() {
        let options = ConversionOptions {
            languages: vec!["deu".to_string(), "eng".to_string(), "fra".to_string()],
            ..Default::default()
        };
        let args = as_strings(&build_args(
            Path::new("in.pdf"),
            Path::new("out.pdf"),
            &options,
        ));
        let idx = args.iter().position(|a| a == "-l").unwrap();
        assert_eq!(args[idx + 1], "deu+eng+fra");
    }

    #[test]
    fn identical_input_yields_identical_argv() {
        let options = ConversionOptions {
            deskew: true,
            skip_text: true,
            optimize: 2,
            ..Default::default()
        };
        let a = build_args(Path::new("in.pdf"), Path::new("out.pdf"), &options);
        let b = build_args(Path::new("in.pdf"), Path::new("out.pdf"), &options);
        assert_eq!(a, b);
    }

    #[test]
    fn paths_are_always_last() {
        let args = as_strings(&build_args(
            Path::new("in.pdf"),
            Path::new("out.pdf"),
            &ConversionOptions::default(),
        ));
        assert_eq!(args[args.len() - 2], "in.pdf");
        assert_eq!(args[args.len() - 1], "out.pdf");
    }
}
