//! Background rasterization against a scripted stand-in converter

#![cfg(unix)]

use form_tools::{
    BackgroundRasterizer, CancellationToken, ExternalTool, FieldNameDump, FixedToolLocator,
    NoToolLocator, RasterOptions, ToolError,
};
use pretty_assertions::assert_eq;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fake converter: writes "page N" to whatever `-sOutputFile=` names
const FAKE_GS: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    -sOutputFile=*) out="${arg#-sOutputFile=}" ;;
    -dFirstPage=*) page="${arg#-dFirstPage=}" ;;
  esac
done
printf 'page %s' "$page" > "$out"
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Unparsable bytes whose page tree advertises `pages` pages
fn write_source(dir: &Path, pages: usize) -> PathBuf {
    let path = dir.join("source.pdf");
    let body = format!("%PDF-1.4\n1 0 obj << /Type /Pages /Count {pages} >> endobj\n");
    std::fs::write(&path, body).unwrap();
    path
}

fn options() -> RasterOptions {
    RasterOptions {
        timeout: Duration::from_secs(10),
        ..RasterOptions::default()
    }
}

#[test]
fn test_renders_each_page_with_deterministic_names() {
    let tools = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let gs = write_script(tools.path(), "gs", FAKE_GS);
    let source = write_source(tools.path(), 3);

    let locator = FixedToolLocator::new().with(ExternalTool::Rasterizer, &gs);
    let rasterizer = BackgroundRasterizer::new(locator, out.path(), options());

    let backgrounds = rasterizer.render_all(&source, "t_fl100", None).unwrap();
    assert_eq!(backgrounds.len(), 3);
    assert_eq!(
        backgrounds[2].path,
        out.path().join("fl100_page3_background.png")
    );
    assert_eq!(std::fs::read_to_string(&backgrounds[1].path).unwrap(), "page 2");
    assert!(rasterizer.has_all_backgrounds("t_fl100", 3));

    // no temporary files left behind
    let entries = std::fs::read_dir(out.path()).unwrap().count();
    assert_eq!(entries, 3);
}

#[test]
fn test_regeneration_overwrites() {
    let tools = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let gs = write_script(tools.path(), "gs", FAKE_GS);
    let source = write_source(tools.path(), 1);

    let stale = out.path().join("fl100_page1_background.png");
    std::fs::write(&stale, "stale").unwrap();

    let locator = FixedToolLocator::new().with(ExternalTool::Rasterizer, &gs);
    let rasterizer = BackgroundRasterizer::new(locator, out.path(), options());
    rasterizer.render_all(&source, "fl100", None).unwrap();

    assert_eq!(std::fs::read_to_string(&stale).unwrap(), "page 1");
}

#[test]
fn test_missing_converter_yields_empty_set() {
    let tools = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let source = write_source(tools.path(), 2);

    let rasterizer = BackgroundRasterizer::new(NoToolLocator, out.path(), options());
    assert!(!rasterizer.is_available());
    let backgrounds = rasterizer.render_all(&source, "fl100", None).unwrap();
    assert!(backgrounds.is_empty());
}

#[test]
fn test_availability_follows_locator() {
    let tools = tempfile::tempdir().unwrap();
    let gs = write_script(tools.path(), "gs", FAKE_GS);
    let locator = FixedToolLocator::new().with(ExternalTool::Rasterizer, &gs);

    let rasterizer = BackgroundRasterizer::new(locator.clone(), tools.path(), options());
    assert!(rasterizer.is_available());
    assert!(!FieldNameDump::new(locator, Duration::from_secs(1)).is_available());
}

#[test]
fn test_missing_source_is_reported() {
    let out = tempfile::tempdir().unwrap();
    let rasterizer = BackgroundRasterizer::new(NoToolLocator, out.path(), options());

    let err = rasterizer
        .render_all(Path::new("/no/such/form.pdf"), "fl100", None)
        .unwrap_err();
    assert!(matches!(err, ToolError::SourceNotFound(_)));
}

#[test]
fn test_failing_converter_skips_pages() {
    let tools = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let gs = write_script(tools.path(), "gs", "#!/bin/sh\necho 'bad page' >&2\nexit 1\n");
    let source = write_source(tools.path(), 2);

    let locator = FixedToolLocator::new().with(ExternalTool::Rasterizer, &gs);
    let rasterizer = BackgroundRasterizer::new(locator, out.path(), options());

    let backgrounds = rasterizer.render_all(&source, "fl100", None).unwrap();
    assert!(backgrounds.is_empty());
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_cancelled_run_keeps_nothing_partial() {
    let tools = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let gs = write_script(tools.path(), "gs", FAKE_GS);
    let source = write_source(tools.path(), 2);

    let token = CancellationToken::new();
    token.cancel();

    let locator = FixedToolLocator::new().with(ExternalTool::Rasterizer, &gs);
    let rasterizer = BackgroundRasterizer::new(locator, out.path(), options());

    let err = rasterizer.render_all(&source, "fl100", Some(&token)).unwrap_err();
    assert!(matches!(err, ToolError::Cancelled));
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_slow_converter_times_out() {
    let tools = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let gs = write_script(tools.path(), "gs", "#!/bin/sh\nsleep 5\n");
    let source = write_source(tools.path(), 1);

    let locator = FixedToolLocator::new().with(ExternalTool::Rasterizer, &gs);
    let rasterizer = BackgroundRasterizer::new(
        locator,
        out.path(),
        RasterOptions {
            timeout: Duration::from_millis(200),
            ..RasterOptions::default()
        },
    );

    let err = rasterizer.render_all(&source, "fl100", None).unwrap_err();
    assert!(err.is_retryable());
}

#[test]
fn test_field_dump_names_are_unplaced() {
    let tools = tempfile::tempdir().unwrap();
    let pdftk = write_script(
        tools.path(),
        "pdftk",
        "#!/bin/sh\necho '---'\necho 'FieldType: Text'\necho 'FieldName: case_number'\necho 'FieldFlags: 0'\n",
    );
    let source = write_source(tools.path(), 1);

    let dump = FieldNameDump::new(
        FixedToolLocator::new().with(ExternalTool::FieldDump, &pdftk),
        Duration::from_secs(10),
    );
    let fields = dump.extract(&source);
    assert_eq!(fields.len(), 1);
    assert!(!fields["case_number"].location.is_known());
}

#[test]
fn test_field_dump_reports_password_protection() {
    let tools = tempfile::tempdir().unwrap();
    let pdftk = write_script(
        tools.path(),
        "pdftk",
        "#!/bin/sh\necho 'OWNER PASSWORD REQUIRED, but not given' >&2\nexit 1\n",
    );
    let source = write_source(tools.path(), 1);

    let dump = FieldNameDump::new(
        FixedToolLocator::new().with(ExternalTool::FieldDump, &pdftk),
        Duration::from_secs(10),
    );
    assert!(matches!(
        dump.dump(&source),
        Err(ToolError::PasswordProtected(_))
    ));
    assert!(dump.extract(&source).is_empty());
}

#[test]
fn test_field_dump_without_tool() {
    let tools = tempfile::tempdir().unwrap();
    let source = write_source(tools.path(), 1);

    let dump = FieldNameDump::new(NoToolLocator, Duration::from_secs(10));
    assert!(matches!(
        dump.dump(&source),
        Err(ToolError::NotFound(ExternalTool::FieldDump))
    ));
}
