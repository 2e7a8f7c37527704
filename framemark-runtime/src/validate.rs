//! Schema validator for NDJSON record streams.
//!
//! Findings are data, not errors: the validator walks every line, collects
//! everything wrong with it, and leaves exit codes and truncated listings to
//! the caller. One unreadable line never hides problems in the lines after
//! it.

use std::fmt;
use std::io::{self, Read};

use serde_json::Value;

use crate::record::{AbortCode, SUPPORTED_SCHEMA_VERSIONS};

/// What a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    /// The line is not a JSON object.
    MalformedRecord,
    MissingField,
    FieldTypeMismatch,
    /// `schema_version` names a version this validator does not know.
    UnsupportedSchema,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedRecord => "malformed-record",
            Self::MissingField => "missing-field",
            Self::FieldTypeMismatch => "field-type-mismatch",
            Self::UnsupportedSchema => "unsupported-schema",
        }
    }
}

/// One problem at one place in the stream.
#[derive(Debug, Clone)]
pub struct Finding {
    /// 1-based line number.
    pub line: usize,
    pub kind: FindingKind,
    /// Dotted field path, empty for whole-line findings.
    pub path: String,
    pub message: String,
}

impl Finding {
    fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            kind: FindingKind::MalformedRecord,
            path: String::new(),
            message: message.into(),
        }
    }

    fn missing(line: usize, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            line,
            kind: FindingKind::MissingField,
            message: format!("required field `{}` is missing", path),
            path,
        }
    }

    fn mismatch(line: usize, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line,
            kind: FindingKind::FieldTypeMismatch,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "line {}: {}: {}", self.line, self.kind.as_str(), self.message)
        } else {
            write!(
                f,
                "line {}: {} `{}`: {}",
                self.line,
                self.kind.as_str(),
                self.path,
                self.message
            )
        }
    }
}

/// Outcome of validating one stream.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Non-blank lines examined.
    pub lines_checked: usize,
    /// Records with no findings at all.
    pub records_valid: usize,
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Str,
    Number,
    UInt,
    Bool,
    Object,
    Array,
}

impl FieldType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Number => value.is_number(),
            Self::UInt => value.is_u64(),
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Self::Str => "expected a string",
            Self::Number => "expected a number",
            Self::UInt => "expected an unsigned integer",
            Self::Bool => "expected a boolean",
            Self::Object => "expected an object",
            Self::Array => "expected an array",
        }
    }

    /// Full mismatch message naming both sides: expected type, found type.
    fn found(&self, value: &Value) -> String {
        format!("{}, got {}", self.expected(), json_type(value))
    }
}

/// Short JSON type name for mismatch messages.
fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

type Obj = serde_json::Map<String, Value>;

/// Envelope fields. The bool marks fields already required by framemark-v1;
/// the rest became required in framemark-v2 but are still type-checked when
/// a v1 record carries them.
const COMMON_FIELDS: &[(&str, FieldType, bool)] = &[
    ("api", FieldType::Str, true),
    ("mode", FieldType::Str, true),
    ("modelUrl", FieldType::Str, true),
    ("instances", FieldType::UInt, true),
    ("trial", FieldType::UInt, true),
    ("trials", FieldType::UInt, true),
    ("durationMs", FieldType::UInt, true),
    ("warmupMs", FieldType::UInt, true),
    ("cooldownMs", FieldType::UInt, true),
    ("betweenInstancesMs", FieldType::UInt, true),
    ("layout", FieldType::Str, true),
    ("spacing", FieldType::Number, true),
    ("seed", FieldType::UInt, true),
    ("shuffle", FieldType::Bool, true),
    ("collectPerf", FieldType::Bool, true),
    ("perfDetail", FieldType::Bool, true),
    ("suiteId", FieldType::Str, false),
    ("startedAt", FieldType::Str, true),
    ("condition_index", FieldType::UInt, false),
    ("condition_count", FieldType::UInt, false),
    ("asset_timing", FieldType::Object, true),
    ("asset_meta", FieldType::Object, false),
    ("env", FieldType::Object, true),
];

const ASSET_TIMING_FIELDS: &[(&str, FieldType)] = &[
    ("fetch_ms", FieldType::Number),
    ("parse_ms", FieldType::Number),
    ("total_ms", FieldType::Number),
];

const ASSET_META_FIELDS: &[(&str, FieldType)] = &[
    ("vertex_count", FieldType::UInt),
    ("index_count", FieldType::UInt),
    ("triangle_count", FieldType::UInt),
    ("has_indices", FieldType::Bool),
];

const SUMMARY_FIELDS: &[(&str, FieldType)] = &[
    ("frames", FieldType::UInt),
    ("duration_ms", FieldType::Number),
    ("mean_ms", FieldType::Number),
    ("p50_ms", FieldType::Number),
    ("p95_ms", FieldType::Number),
    ("p99_ms", FieldType::Number),
];

const EXTRAS_FIELDS: &[(&str, FieldType)] = &[
    ("fps_effective", FieldType::Number),
    ("fps_from_mean", FieldType::Number),
    ("target_ms", FieldType::Number),
    ("missed_1.5x", FieldType::UInt),
    ("missed_2x", FieldType::UInt),
    ("missed_1.5x_pct", FieldType::Number),
    ("max_frame_ms", FieldType::Number),
    ("jank_p99_over_p50", FieldType::Number),
];

const PARTIAL_TRIAL_FIELDS: &[(&str, FieldType)] = &[
    ("elapsed_ms", FieldType::Number),
    ("frames_collected_primary", FieldType::UInt),
    ("frames_collected_secondary", FieldType::UInt),
];

/// Validate a whole NDJSON document. Blank lines are skipped; line numbers
/// still count them so findings match editor positions.
pub fn validate_str(input: &str) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (idx, raw) in input.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        report.lines_checked += 1;
        let before = report.findings.len();
        check_line(raw, idx + 1, &mut report.findings);
        if report.findings.len() == before {
            report.records_valid += 1;
        }
    }

    report
}

/// Validate from any reader (file, stdin).
pub fn validate_reader<R: Read>(mut reader: R) -> io::Result<ValidationReport> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;
    Ok(validate_str(&input))
}

fn check_line(raw: &str, line: usize, findings: &mut Vec<Finding>) {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            findings.push(Finding::malformed(line, err.to_string()));
            return;
        }
    };
    let Some(obj) = value.as_object() else {
        findings.push(Finding::malformed(line, "not a JSON object"));
        return;
    };

    // Schema version gates everything else: a record that does not even
    // declare one gets exactly one finding, not a cascade.
    let version = match obj.get("schema_version") {
        None => {
            findings.push(Finding::missing(line, "schema_version"));
            return;
        }
        Some(value) => match value.as_str() {
            Some(version) => version,
            None => {
                findings.push(Finding::mismatch(
                    line,
                    "schema_version",
                    FieldType::Str.found(value),
                ));
                return;
            }
        },
    };
    if !SUPPORTED_SCHEMA_VERSIONS.contains(&version) {
        findings.push(Finding {
            line,
            kind: FindingKind::UnsupportedSchema,
            path: "schema_version".to_string(),
            message: format!("unsupported schema version '{}'", version),
        });
        return;
    }
    let v1 = version == "framemark-v1";

    for &(name, ty, required_in_v1) in COMMON_FIELDS {
        let required = required_in_v1 || !v1;
        check_field(obj, name, ty, required, line, findings);
    }

    if let Some(mode) = obj.get("mode").and_then(Value::as_str) {
        if mode != "windowed" && mode != "immersive" {
            findings.push(Finding::mismatch(
                line,
                "mode",
                format!("unknown mode '{}'", mode),
            ));
        }
    }
    if let Some(layout) = obj.get("layout").and_then(Value::as_str) {
        if !["grid", "ring", "line"].contains(&layout) {
            findings.push(Finding::mismatch(
                line,
                "layout",
                format!("unknown layout '{}'", layout),
            ));
        }
    }

    check_shape(obj, "asset_timing", ASSET_TIMING_FIELDS, line, findings);
    check_shape(obj, "asset_meta", ASSET_META_FIELDS, line, findings);

    match obj.get("aborted") {
        Some(Value::Bool(true)) => check_abort(obj, line, findings),
        Some(Value::Bool(false)) | None => check_trial(obj, line, findings),
        Some(value) => {
            findings.push(Finding::mismatch(line, "aborted", FieldType::Bool.found(value)));
        }
    }
}

fn check_trial(obj: &Obj, line: usize, findings: &mut Vec<Finding>) {
    if check_field(obj, "summary", FieldType::Object, true, line, findings) {
        check_shape(obj, "summary", SUMMARY_FIELDS, line, findings);
    }
    if check_field(obj, "extras", FieldType::Object, true, line, findings) {
        check_shape(obj, "extras", EXTRAS_FIELDS, line, findings);
    }

    // The perf key is always written, as null when nothing was collected.
    match obj.get("perf") {
        None => findings.push(Finding::missing(line, "perf")),
        Some(value) if value.is_null() || value.is_object() => {}
        Some(value) => findings.push(Finding::mismatch(
            line,
            "perf",
            format!("expected an object or null, got {}", json_type(value)),
        )),
    }

    if obj.get("mode").and_then(Value::as_str) == Some("immersive") {
        check_viewports(obj, line, findings);
        if check_field(obj, "xr_cadence_secondary", FieldType::Object, true, line, findings) {
            check_shape(obj, "xr_cadence_secondary", SUMMARY_FIELDS, line, findings);
        }
        check_field(obj, "xr_effective_pixels", FieldType::UInt, true, line, findings);
    }

    check_numeric_array(obj, "raw_samples", line, findings);
    check_numeric_array(obj, "raw_samples_secondary", line, findings);
}

fn check_abort(obj: &Obj, line: usize, findings: &mut Vec<Finding>) {
    if let Some(code) = obj.get("abort_code") {
        match code.as_str() {
            Some(code) if AbortCode::WIRE_NAMES.contains(&code) => {}
            Some(code) => findings.push(Finding::mismatch(
                line,
                "abort_code",
                format!("unknown abort code '{}'", code),
            )),
            None => findings.push(Finding::mismatch(
                line,
                "abort_code",
                FieldType::Str.found(code),
            )),
        }
    } else {
        findings.push(Finding::missing(line, "abort_code"));
    }

    check_field(obj, "abort_reason", FieldType::Str, true, line, findings);
    check_field(obj, "observed_view_count", FieldType::UInt, true, line, findings);
    check_field(obj, "expected_max_views", FieldType::UInt, true, line, findings);
    if check_field(obj, "partial_trial", FieldType::Object, true, line, findings) {
        check_shape(obj, "partial_trial", PARTIAL_TRIAL_FIELDS, line, findings);
    }
}

/// Check one top-level field. Returns true when the field is present with
/// the right type.
fn check_field(
    obj: &Obj,
    name: &str,
    ty: FieldType,
    required: bool,
    line: usize,
    findings: &mut Vec<Finding>,
) -> bool {
    match obj.get(name) {
        None => {
            if required {
                findings.push(Finding::missing(line, name));
            }
            false
        }
        Some(value) if ty.matches(value) => true,
        Some(value) => {
            findings.push(Finding::mismatch(line, name, ty.found(value)));
            false
        }
    }
}

/// Check the inner fields of an object-valued field, if it is an object at
/// all. Absence and wrong outer type are the caller's findings.
fn check_shape(
    obj: &Obj,
    name: &str,
    fields: &[(&str, FieldType)],
    line: usize,
    findings: &mut Vec<Finding>,
) {
    let Some(inner) = obj.get(name).and_then(Value::as_object) else {
        return;
    };
    for &(field, ty) in fields {
        let path = format!("{}.{}", name, field);
        match inner.get(field) {
            None => findings.push(Finding::missing(line, path)),
            Some(value) if ty.matches(value) => {}
            Some(value) => findings.push(Finding::mismatch(line, path, ty.found(value))),
        }
    }
}

fn check_viewports(obj: &Obj, line: usize, findings: &mut Vec<Finding>) {
    if !check_field(obj, "xr_viewports", FieldType::Array, true, line, findings) {
        return;
    }
    let Some(views) = obj.get("xr_viewports").and_then(Value::as_array) else {
        return;
    };
    for (i, view) in views.iter().enumerate() {
        let Some(view) = view.as_object() else {
            findings.push(Finding::mismatch(
                line,
                format!("xr_viewports[{}]", i),
                FieldType::Object.found(view),
            ));
            continue;
        };
        for field in ["width", "height"] {
            let path = format!("xr_viewports[{}].{}", i, field);
            match view.get(field) {
                None => findings.push(Finding::missing(line, path)),
                Some(value) if value.is_u64() => {}
                Some(value) => {
                    findings.push(Finding::mismatch(line, path, FieldType::UInt.found(value)))
                }
            }
        }
    }
}

/// Raw sample arrays are optional, but every element must be numeric when
/// they appear.
fn check_numeric_array(obj: &Obj, name: &str, line: usize, findings: &mut Vec<Finding>) {
    let Some(value) = obj.get(name) else {
        return;
    };
    let Some(items) = value.as_array() else {
        findings.push(Finding::mismatch(line, name, FieldType::Array.found(value)));
        return;
    };
    for (i, item) in items.iter().enumerate() {
        if !item.is_number() {
            findings.push(Finding::mismatch(
                line,
                format!("{}[{}]", name, i),
                FieldType::Number.found(item),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::{build_abort_record, PartialProbe};
    use crate::config::SuiteConfig;
    use crate::plan::Condition;
    use crate::record::{Record, SuiteMeta, SurfaceMode, TrialRecord};
    use crate::session::Viewport;
    use crate::stats::{derive_extras, Summary};

    fn produced_trial(mode: SurfaceMode) -> TrialRecord {
        let meta = SuiteMeta::stamped("gl", "builtin://torus", "fm-validate");
        let summary = Summary {
            frames: 3,
            duration_ms: 66.1,
            mean_ms: 22.0,
            p50_ms: 16.7,
            p95_ms: 16.7,
            p99_ms: 16.7,
        };
        let extras = derive_extras(&summary, &[16.0, 33.4, 16.7]);
        let immersive = mode == SurfaceMode::Immersive;
        TrialRecord {
            common: meta.common(
                &SuiteConfig::default(),
                mode,
                Condition {
                    instance_count: 500,
                    trial: 2,
                },
                4,
                6,
                1,
            ),
            summary,
            extras,
            perf: None,
            xr_viewports: immersive.then(|| {
                vec![
                    Viewport {
                        width: 1832,
                        height: 1920,
                    };
                    2
                ]
            }),
            xr_cadence_secondary: immersive.then(Summary::empty),
            xr_effective_pixels: immersive.then(|| 2 * 1832 * 1920),
            raw_samples: None,
            raw_samples_secondary: None,
        }
    }

    fn trial_line(mode: SurfaceMode) -> String {
        serde_json::to_string(&Record::Trial(produced_trial(mode))).unwrap()
    }

    fn abort_line() -> String {
        let meta = SuiteMeta::stamped("wgpu", "builtin://torus", "fm-validate");
        let common = meta.common(
            &SuiteConfig::default(),
            SurfaceMode::Immersive,
            Condition {
                instance_count: 1000,
                trial: 1,
            },
            6,
            6,
            1,
        );
        let record = build_abort_record(
            common,
            crate::record::AbortCode::ViewCountExceeded,
            "view count exceeded: observed 3, max 2",
            2,
            PartialProbe {
                elapsed_ms: 412.0,
                primary_frames: 29,
                secondary_frames: 29,
                observed_views: 3,
            },
        );
        serde_json::to_string(&Record::Abort(record)).unwrap()
    }

    /// Reparse a produced line, mutate the object, reserialize.
    fn mutate(line: &str, f: impl FnOnce(&mut serde_json::Map<String, Value>)) -> String {
        let mut value: Value = serde_json::from_str(line).unwrap();
        f(value.as_object_mut().unwrap());
        serde_json::to_string(&value).unwrap()
    }

    #[test]
    fn test_produced_stream_validates_clean() {
        let input = format!(
            "{}\n{}\n{}\n",
            trial_line(SurfaceMode::Windowed),
            trial_line(SurfaceMode::Immersive),
            abort_line()
        );
        let report = validate_str(&input);
        assert!(report.is_clean(), "findings: {:?}", report.findings);
        assert_eq!(report.lines_checked, 3);
        assert_eq!(report.records_valid, 3);
    }

    #[test]
    fn test_blank_lines_skipped_but_numbering_kept() {
        let input = format!("\n{}\n\n", trial_line(SurfaceMode::Windowed));
        let report = validate_str(&input);
        assert!(report.is_clean());
        assert_eq!(report.lines_checked, 1);
    }

    #[test]
    fn test_malformed_line_reports_position_and_spares_others() {
        let input = format!(
            "{}\n{{\"schema_version\": \n{}\n",
            trial_line(SurfaceMode::Windowed),
            trial_line(SurfaceMode::Windowed)
        );
        let report = validate_str(&input);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::MalformedRecord);
        assert_eq!(report.findings[0].line, 2);
        assert_eq!(report.records_valid, 2);
    }

    #[test]
    fn test_non_object_line_is_malformed() {
        let report = validate_str("[1, 2, 3]\n");
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::MalformedRecord);
    }

    #[test]
    fn test_missing_schema_version_yields_exactly_one_finding() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            obj.remove("schema_version");
        });
        let report = validate_str(&line);
        // No cascade into the other required-field checks.
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::MissingField);
        assert_eq!(report.findings[0].path, "schema_version");
    }

    #[test]
    fn test_unknown_schema_version_rejected() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            obj.insert("schema_version".to_string(), "framemark-v3".into());
        });
        let report = validate_str(&line);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].kind, FindingKind::UnsupportedSchema);
        assert!(report.findings[0].message.contains("framemark-v3"));
    }

    #[test]
    fn test_field_type_mismatch_names_the_path() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            obj.insert("instances".to_string(), "five hundred".into());
        });
        let report = validate_str(&line);
        assert_eq!(report.findings.len(), 1);
        let finding = &report.findings[0];
        assert_eq!(finding.kind, FindingKind::FieldTypeMismatch);
        assert_eq!(finding.path, "instances");
        assert!(finding.to_string().contains("line 1"));
    }

    #[test]
    fn test_mismatch_message_names_both_types() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            obj.insert("instances".to_string(), "five hundred".into());
            obj.insert("shuffle".to_string(), serde_json::json!([1]));
            obj.insert("perf".to_string(), true.into());
        });
        let report = validate_str(&line);

        let message_for = |path: &str| {
            report
                .findings
                .iter()
                .find(|f| f.path == path)
                .map(|f| f.message.as_str())
                .unwrap_or_default()
        };
        assert_eq!(
            message_for("instances"),
            "expected an unsigned integer, got string"
        );
        assert_eq!(message_for("shuffle"), "expected a boolean, got array");
        assert_eq!(
            message_for("perf"),
            "expected an object or null, got boolean"
        );
    }

    #[test]
    fn test_nested_summary_fields_checked() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            let summary = obj.get_mut("summary").unwrap().as_object_mut().unwrap();
            summary.remove("p95_ms");
            summary.insert("frames".to_string(), (-3).into());
        });
        let report = validate_str(&line);
        let paths: Vec<&str> = report.findings.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"summary.p95_ms"));
        assert!(paths.contains(&"summary.frames"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            obj.insert("mode".to_string(), "holographic".into());
        });
        let report = validate_str(&line);
        assert!(report
            .findings
            .iter()
            .any(|f| f.path == "mode" && f.message.contains("holographic")));
    }

    #[test]
    fn test_unknown_abort_code_rejected() {
        let line = mutate(&abort_line(), |obj| {
            obj.insert("abort_code".to_string(), "gpu-on-fire".into());
        });
        let report = validate_str(&line);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].path, "abort_code");
        assert!(report.findings[0].message.contains("gpu-on-fire"));
    }

    #[test]
    fn test_missing_perf_key_flagged() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            obj.remove("perf");
        });
        let report = validate_str(&line);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].path, "perf");
        assert_eq!(report.findings[0].kind, FindingKind::MissingField);
    }

    #[test]
    fn test_immersive_trial_requires_xr_fields() {
        let line = mutate(&trial_line(SurfaceMode::Immersive), |obj| {
            obj.remove("xr_viewports");
            obj.remove("xr_effective_pixels");
        });
        let report = validate_str(&line);
        let paths: Vec<&str> = report.findings.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"xr_viewports"));
        assert!(paths.contains(&"xr_effective_pixels"));
        assert!(!paths.contains(&"xr_cadence_secondary"));
    }

    #[test]
    fn test_windowed_trial_needs_no_xr_fields() {
        let report = validate_str(&trial_line(SurfaceMode::Windowed));
        assert!(report.is_clean());
    }

    #[test]
    fn test_raw_samples_must_be_numeric() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            obj.insert(
                "raw_samples".to_string(),
                serde_json::json!([16.6, 16.7, "fast", 17.0]),
            );
        });
        let report = validate_str(&line);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].path, "raw_samples[2]");
    }

    #[test]
    fn test_viewport_elements_checked() {
        let line = mutate(&trial_line(SurfaceMode::Immersive), |obj| {
            obj.insert(
                "xr_viewports".to_string(),
                serde_json::json!([{"width": 1832, "height": 1920}, {"width": "wide"}]),
            );
        });
        let report = validate_str(&line);
        let paths: Vec<&str> = report.findings.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"xr_viewports[1].width"));
        assert!(paths.contains(&"xr_viewports[1].height"));
    }

    #[test]
    fn test_v1_records_get_relaxed_envelope() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            obj.insert("schema_version".to_string(), "framemark-v1".into());
            obj.remove("suiteId");
            obj.remove("condition_index");
            obj.remove("condition_count");
            obj.remove("asset_meta");
        });
        let report = validate_str(&line);
        assert!(report.is_clean(), "findings: {:?}", report.findings);
    }

    #[test]
    fn test_v2_requires_the_full_envelope() {
        let line = mutate(&trial_line(SurfaceMode::Windowed), |obj| {
            obj.remove("suiteId");
        });
        let report = validate_str(&line);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].path, "suiteId");
    }

    #[test]
    fn test_validate_reader_matches_validate_str() {
        let input = format!("{}\n", trial_line(SurfaceMode::Windowed));
        let report = validate_reader(input.as_bytes()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.lines_checked, 1);
    }
}
