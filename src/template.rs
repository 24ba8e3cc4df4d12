use super::*;
use fancy_regex::Regex;

const INTERPOLATE_PATTERN: &str = r"\$\{(.+?)\}";
const DEFAULT_PATTERN: &str = r"([^|]+?)\|([^|]+)";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "['{key}']"),
            Self::Index(idx) => write!(f, "[{idx}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Lookup {
        expr: String,
        path: Vec<Segment>,
        default: Option<String>,
    },
}

/// Compiled interpolation template. Rendering is pure, so compiled templates
/// can be cached by source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

/// Compiles `${path}` / `${path|default}` markers. Line breaks in the source
/// are dropped before compiling.
pub fn compile_template(source: &str) -> Result<Template> {
    let interpolate = compile_regex(INTERPOLATE_PATTERN)?;
    let default_value = compile_regex(DEFAULT_PATTERN)?;
    let flattened = source.replace(['\r', '\n'], "");

    let mut parts = Vec::new();
    let mut last = 0usize;
    for caps in interpolate.captures_iter(&flattened) {
        let caps = caps.map_err(|err| Error::TemplateParse(err.to_string()))?;
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            parts.push(Part::Literal(flattened[last..whole.start()].to_string()));
        }
        last = whole.end();

        let mut expr = inner.as_str().to_string();
        let mut default = None;
        if let Some(options) = default_value
            .captures(&expr)
            .map_err(|err| Error::TemplateParse(err.to_string()))?
        {
            let primary = options.get(1).map(|m| m.as_str().to_string());
            default = options.get(2).map(|m| m.as_str().trim().to_string());
            if let Some(primary) = primary {
                expr = primary;
            }
        }
        let expr = expr.trim().to_string();
        let path = parse_path(&expr)?;
        parts.push(Part::Lookup {
            expr,
            path,
            default: default.filter(|value| !value.is_empty()),
        });
    }
    if last < flattened.len() {
        parts.push(Part::Literal(flattened[last..].to_string()));
    }

    Ok(Template {
        source: source.to_string(),
        parts,
    })
}

fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| Error::TemplateParse(err.to_string()))
}

/// `a.b`, `a.0`, `a[0]`, `a['b']` and `a["b"]` into lookup segments.
fn parse_path(expr: &str) -> Result<Vec<Segment>> {
    let invalid = || Error::TemplateParse(format!("invalid property path: {expr}"));
    let chars = expr.chars().collect::<Vec<_>>();
    let mut segments = Vec::new();
    let mut i = 0usize;

    let read_name = |i: &mut usize| -> String {
        let start = *i;
        while *i < chars.len() && chars[*i] != '.' && chars[*i] != '[' {
            *i += 1;
        }
        chars[start..*i].iter().collect::<String>().trim().to_string()
    };

    let first = read_name(&mut i);
    if first.is_empty() {
        return Err(invalid());
    }
    segments.push(Segment::Key(first));

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                let name = read_name(&mut i);
                if name.is_empty() {
                    return Err(invalid());
                }
                segments.push(match name.parse::<usize>() {
                    Ok(idx) => Segment::Index(idx),
                    Err(_) => Segment::Key(name),
                });
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|ch| *ch == ']')
                    .map(|offset| i + offset)
                    .ok_or_else(invalid)?;
                let raw = chars[i + 1..close].iter().collect::<String>();
                let raw = raw.trim();
                let quoted = raw.len() >= 2
                    && ((raw.starts_with('\'') && raw.ends_with('\''))
                        || (raw.starts_with('"') && raw.ends_with('"')));
                if quoted {
                    segments.push(Segment::Key(raw[1..raw.len() - 1].to_string()));
                } else {
                    let idx = raw.parse::<usize>().map_err(|_| invalid())?;
                    segments.push(Segment::Index(idx));
                }
                i = close + 1;
            }
            _ => return Err(invalid()),
        }
    }
    Ok(segments)
}

impl Template {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders against `input`. A lookup that cannot be resolved falls back
    /// to its default, or fails with `TemplateEvaluation`.
    pub fn render(&self, input: &Value) -> Result<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Lookup {
                    expr,
                    path,
                    default,
                } => match (resolve(input, path), default) {
                    (Some(value), _) => out.push_str(&value.as_string()),
                    (None, Some(default)) => out.push_str(default),
                    (None, None) => {
                        return Err(Error::TemplateEvaluation(format!(
                            "cannot read {expr}"
                        )));
                    }
                },
            }
        }
        Ok(out)
    }

    /// Renders against a record, the usual shape of template input.
    pub fn render_record(&self, input: &Record) -> Result<String> {
        self.render(&Value::Object(input.clone()))
    }

    /// Rendering body in expression form, for diagnostics.
    pub(crate) fn describe(&self) -> String {
        let mut out = Vec::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push(format!("'{text}'")),
                Part::Lookup { path, default, .. } => {
                    let lookup = path.iter().map(ToString::to_string).collect::<String>();
                    match default {
                        Some(default) => out.push(format!("(__obj{lookup} ?? '{default}')")),
                        None => out.push(format!("__obj{lookup}")),
                    }
                }
            }
        }
        if out.is_empty() {
            return "''".into();
        }
        out.join(" + ")
    }
}

fn resolve<'a>(input: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    let mut current = input;
    for segment in path {
        current = match segment {
            Segment::Key(key) => current.get(key)?,
            Segment::Index(idx) => current.index(*idx)?,
        };
    }
    Some(current)
}
