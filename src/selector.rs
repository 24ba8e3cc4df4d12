use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
    Includes { key: String, value: String },
    DashMatch { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorPseudoClass {
    Root,
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    Empty,
    Checked,
    Disabled,
    Enabled,
    NthChild(NthChildSelector),
    NthLastChild(NthChildSelector),
    Not(Vec<Vec<SelectorPart>>),
    Is(Vec<Vec<SelectorPart>>),
    Where(Vec<Vec<SelectorPart>>),
    Has(Vec<Vec<SelectorPart>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NthChildSelector {
    Exact(usize),
    Odd,
    Even,
    AnPlusB(i64, i64),
}

impl NthChildSelector {
    pub(crate) fn matches_index(&self, index: usize) -> bool {
        match self {
            Self::Exact(expected) => index == *expected,
            Self::Odd => index % 2 == 1,
            Self::Even => index % 2 == 0,
            Self::AnPlusB(a, b) => {
                let diff = index as i64 - *b;
                if *a == 0 {
                    return diff == 0;
                }
                diff % *a == 0 && (diff / *a) >= 0
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<SelectorAttrCondition>,
    pub(crate) pseudo_classes: Vec<SelectorPseudoClass>,
}

impl SelectorStep {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && !self.universal
            && self.pseudo_classes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    pub(crate) combinator: Option<SelectorCombinator>,
}

/// A parsed selector list (`a, b > c`).
pub(crate) type SelectorGroups = Vec<Vec<SelectorPart>>;

pub(crate) fn parse_selector_groups(selector: &str) -> Result<SelectorGroups> {
    let groups = split_selector_groups(selector)?;
    let mut parsed = Vec::with_capacity(groups.len());
    for group in groups {
        parsed.push(parse_selector_chain(&group)?);
    }
    Ok(parsed)
}

pub(crate) fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let mut steps = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;

    for token in tokenize_selector(selector)? {
        let combinator = match token.as_str() {
            ">" => Some(SelectorCombinator::Child),
            "+" => Some(SelectorCombinator::AdjacentSibling),
            "~" => Some(SelectorCombinator::GeneralSibling),
            _ => None,
        };
        if let Some(combinator) = combinator {
            if pending_combinator.is_some() || steps.is_empty() {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            pending_combinator = Some(combinator);
            continue;
        }

        let step = parse_selector_step(&token)?;
        let combinator = if steps.is_empty() {
            None
        } else {
            Some(
                pending_combinator
                    .take()
                    .unwrap_or(SelectorCombinator::Descendant),
            )
        };
        steps.push(SelectorPart { step, combinator });
    }

    if steps.is_empty() || pending_combinator.is_some() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(steps)
}

/// Tracks `[...]`/`(...)` nesting so splitting only happens at the top level.
#[derive(Default)]
struct Nesting {
    brackets: usize,
    parens: usize,
}

impl Nesting {
    fn feed(&mut self, ch: char, selector: &str) -> Result<()> {
        match ch {
            '[' => self.brackets += 1,
            ']' => {
                self.brackets = self
                    .brackets
                    .checked_sub(1)
                    .ok_or_else(|| Error::UnsupportedSelector(selector.into()))?;
            }
            '(' => self.parens += 1,
            ')' => {
                self.parens = self
                    .parens
                    .checked_sub(1)
                    .ok_or_else(|| Error::UnsupportedSelector(selector.into()))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn top_level(&self) -> bool {
        self.brackets == 0 && self.parens == 0
    }
}

pub(crate) fn split_selector_groups(selector: &str) -> Result<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut nesting = Nesting::default();

    for ch in selector.chars() {
        if ch == ',' && nesting.top_level() {
            let trimmed = current.trim();
            if trimmed.is_empty() {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            groups.push(trimmed.to_string());
            current.clear();
            continue;
        }
        nesting.feed(ch, selector)?;
        current.push(ch);
    }

    if !nesting.top_level() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    let trimmed = current.trim();
    if trimmed.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    groups.push(trimmed.to_string());
    Ok(groups)
}

pub(crate) fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut nesting = Nesting::default();

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.trim().is_empty() {
            tokens.push(current.trim().to_string());
        }
        current.clear();
    };

    for ch in selector.chars() {
        if nesting.top_level() {
            if matches!(ch, '>' | '+' | '~') {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
                continue;
            }
            if ch.is_ascii_whitespace() {
                flush(&mut current, &mut tokens);
                continue;
            }
        }
        nesting.feed(ch, selector)?;
        current.push(ch);
    }

    if !nesting.top_level() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

pub(crate) fn parse_selector_step(part: &str) -> Result<SelectorStep> {
    let part = part.trim();
    let unsupported = || Error::UnsupportedSelector(part.into());
    if part.is_empty() {
        return Err(unsupported());
    }

    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut step = SelectorStep::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.universal {
                    return Err(unsupported());
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                let (id, next) = parse_selector_ident(part, i + 1).ok_or_else(unsupported)?;
                if step.id.replace(id).is_some() {
                    return Err(unsupported());
                }
                i = next;
            }
            b'.' => {
                let (class_name, next) =
                    parse_selector_ident(part, i + 1).ok_or_else(unsupported)?;
                step.classes.push(class_name);
                i = next;
            }
            b'[' => {
                let (attr, next) = parse_selector_attr_condition(part, i)?;
                step.attrs.push(attr);
                i = next;
            }
            b':' => {
                let (pseudo, next) = parse_selector_pseudo(part, i).ok_or_else(unsupported)?;
                step.pseudo_classes.push(pseudo);
                i = next;
            }
            _ => {
                if step.tag.is_some()
                    || step.id.is_some()
                    || !step.classes.is_empty()
                    || step.universal
                {
                    return Err(unsupported());
                }
                let (tag, next) = parse_selector_ident(part, i).ok_or_else(unsupported)?;
                step.tag = Some(tag);
                i = next;
            }
        }
    }

    if step.is_empty() {
        return Err(unsupported());
    }
    Ok(step)
}

const SIMPLE_PSEUDO_CLASSES: &[(&str, SelectorPseudoClass)] = &[
    ("root", SelectorPseudoClass::Root),
    ("first-child", SelectorPseudoClass::FirstChild),
    ("last-child", SelectorPseudoClass::LastChild),
    ("only-child", SelectorPseudoClass::OnlyChild),
    ("first-of-type", SelectorPseudoClass::FirstOfType),
    ("last-of-type", SelectorPseudoClass::LastOfType),
    ("only-of-type", SelectorPseudoClass::OnlyOfType),
    ("empty", SelectorPseudoClass::Empty),
    ("checked", SelectorPseudoClass::Checked),
    ("disabled", SelectorPseudoClass::Disabled),
    ("enabled", SelectorPseudoClass::Enabled),
];

pub(crate) fn parse_selector_pseudo(
    part: &str,
    start: usize,
) -> Option<(SelectorPseudoClass, usize)> {
    if part.as_bytes().get(start)? != &b':' {
        return None;
    }
    let start = start + 1;
    let tail = part.get(start..)?;

    let (name, next) = parse_selector_ident(part, start)?;
    if part.as_bytes().get(next) != Some(&b'(') {
        if let Some(ch) = part.as_bytes().get(next) {
            if !is_selector_continuation(ch) {
                return None;
            }
        }
        return SIMPLE_PSEUDO_CLASSES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, pseudo)| (pseudo.clone(), next));
    }

    let body_start = next + 1;
    let close_pos = find_matching_paren(tail.get(name.len() + 1..)?)?;
    let raw = part.get(body_start..body_start + close_pos)?.trim();
    if raw.is_empty() {
        return None;
    }
    let after = body_start + close_pos + 1;
    if let Some(ch) = part.as_bytes().get(after) {
        if !is_selector_continuation(ch) {
            return None;
        }
    }

    let pseudo = match name.as_str() {
        "nth-child" => SelectorPseudoClass::NthChild(parse_nth_child_selector(raw)?),
        "nth-last-child" => SelectorPseudoClass::NthLastChild(parse_nth_child_selector(raw)?),
        "not" => SelectorPseudoClass::Not(parse_selector_groups(raw).ok()?),
        "is" => SelectorPseudoClass::Is(parse_selector_groups(raw).ok()?),
        "where" => SelectorPseudoClass::Where(parse_selector_groups(raw).ok()?),
        "has" => SelectorPseudoClass::Has(parse_selector_groups(raw).ok()?),
        _ => return None,
    };
    Some((pseudo, after))
}

pub(crate) fn find_matching_paren(body: &str) -> Option<usize> {
    let mut paren_depth = 1usize;
    let mut bracket_depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (idx, b) in body.bytes().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }

        match b {
            b'\'' | b'"' => quote = Some(b),
            b'[' => bracket_depth += 1,
            b']' => bracket_depth = bracket_depth.checked_sub(1)?,
            b'(' if bracket_depth == 0 => paren_depth += 1,
            b')' if bracket_depth == 0 => {
                paren_depth = paren_depth.checked_sub(1)?;
                if paren_depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

pub(crate) fn parse_nth_child_selector(raw: &str) -> Option<NthChildSelector> {
    let compact = raw
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    match compact.as_str() {
        "" => None,
        "odd" => Some(NthChildSelector::Odd),
        "even" => Some(NthChildSelector::Even),
        other if other.contains('n') => parse_nth_child_expression(other),
        other if other.starts_with(['+', '-']) => None,
        other => match other.parse::<usize>().ok()? {
            0 => None,
            value => Some(NthChildSelector::Exact(value)),
        },
    }
}

fn parse_nth_child_expression(expr: &str) -> Option<NthChildSelector> {
    if expr.matches('n').count() != 1 {
        return None;
    }

    let n_pos = expr.find('n')?;
    let (a_part, rest) = expr.split_at(n_pos);
    let b_part = &rest[1..];

    let a = match a_part {
        "" | "+" => 1,
        "-" => -1,
        _ => a_part.parse::<i64>().ok()?,
    };

    if b_part.is_empty() {
        return Some(NthChildSelector::AnPlusB(a, 0));
    }

    let (sign, raw_b) = if let Some(rest) = b_part.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = b_part.strip_prefix('-') {
        (-1, rest)
    } else {
        return None;
    };
    let b = raw_b.parse::<i64>().ok()?;
    Some(NthChildSelector::AnPlusB(a, b * sign))
}

fn is_selector_continuation(next: &u8) -> bool {
    matches!(next, b'.' | b'#' | b'[' | b':')
}

fn parse_selector_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    let mut end = start;
    let mut out = String::new();
    while end < bytes.len() {
        match bytes[end] {
            // `\-` and friends escape a single character.
            b'\\' if end + 1 < bytes.len() => {
                out.push(bytes[end + 1] as char);
                end += 2;
            }
            b if is_selector_ident_char(b) => {
                out.push(b as char);
                end += 1;
            }
            _ => break,
        }
    }
    if out.is_empty() {
        return None;
    }
    Some((out, end))
}

fn is_selector_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

#[derive(Debug, Clone, Copy)]
enum AttrOperator {
    Eq,
    StartsWith,
    EndsWith,
    Contains,
    Includes,
    DashMatch,
}

fn parse_selector_attr_condition(
    src: &str,
    open_bracket: usize,
) -> Result<(SelectorAttrCondition, usize)> {
    let unsupported = || Error::UnsupportedSelector(src.into());
    let bytes = src.as_bytes();
    let mut i = open_bracket + 1;
    let skip_ws = |i: &mut usize| {
        while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
            *i += 1;
        }
    };

    skip_ws(&mut i);
    let key_start = i;
    while i < bytes.len() && is_selector_attr_name_char(bytes[i]) {
        i += 1;
    }
    if key_start == i {
        return Err(unsupported());
    }
    let key = src
        .get(key_start..i)
        .ok_or_else(unsupported)?
        .to_ascii_lowercase();

    skip_ws(&mut i);
    match bytes.get(i) {
        None => return Err(unsupported()),
        Some(b']') => return Ok((SelectorAttrCondition::Exists { key }, i + 1)),
        Some(_) => {}
    }

    let (op, next) = match (bytes[i], bytes.get(i + 1)) {
        (b'=', _) => (AttrOperator::Eq, i + 1),
        (b'^', Some(b'=')) => (AttrOperator::StartsWith, i + 2),
        (b'$', Some(b'=')) => (AttrOperator::EndsWith, i + 2),
        (b'*', Some(b'=')) => (AttrOperator::Contains, i + 2),
        (b'~', Some(b'=')) => (AttrOperator::Includes, i + 2),
        (b'|', Some(b'=')) => (AttrOperator::DashMatch, i + 2),
        _ => return Err(unsupported()),
    };

    i = next;
    skip_ws(&mut i);
    let (value, after_value) = parse_selector_attr_value(src, i)?;
    i = after_value;
    skip_ws(&mut i);
    if bytes.get(i) != Some(&b']') {
        return Err(unsupported());
    }

    let cond = match op {
        AttrOperator::Eq => SelectorAttrCondition::Eq { key, value },
        AttrOperator::StartsWith => SelectorAttrCondition::StartsWith { key, value },
        AttrOperator::EndsWith => SelectorAttrCondition::EndsWith { key, value },
        AttrOperator::Contains => SelectorAttrCondition::Contains { key, value },
        AttrOperator::Includes => SelectorAttrCondition::Includes { key, value },
        AttrOperator::DashMatch => SelectorAttrCondition::DashMatch { key, value },
    };
    Ok((cond, i + 1))
}

fn is_selector_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b':'
}

fn parse_selector_attr_value(src: &str, start: usize) -> Result<(String, usize)> {
    let unsupported = || Error::UnsupportedSelector(src.into());
    let bytes = src.as_bytes();
    if start >= bytes.len() {
        return Err(unsupported());
    }

    if bytes[start] == b'"' || bytes[start] == b'\'' {
        let quote = bytes[start];
        let mut i = start + 1;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                i = (i + 2).min(bytes.len());
                continue;
            }
            if bytes[i] == quote {
                let raw = src.get(start + 1..i).ok_or_else(unsupported)?;
                return Ok((unescape_selector_string(raw), i + 1));
            }
            i += 1;
        }
        return Err(unsupported());
    }

    let mut i = start;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b']' {
        i += if bytes[i] == b'\\' { 2 } else { 1 };
    }
    let i = i.min(bytes.len());
    let raw = src.get(start..i).ok_or_else(unsupported)?;
    Ok((unescape_selector_string(raw), i))
}

fn unescape_selector_string(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
            continue;
        }
        out.push(ch);
    }
    out
}
