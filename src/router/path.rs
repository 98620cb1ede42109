use crate::error::{Result, TrellisError};
use crate::http::{ParamVec, PathParams};
use regex::Regex;
use std::sync::Arc;

/// Name bound to the text captured by a `*` wildcard.
pub const WILDCARD_PARAM: &str = "*";

/// Join path fragments on `/`, collapsing redundant slashes.
///
/// Empty fragments are skipped; the result always starts with `/` and never
/// ends with one unless it is the root.
pub fn join_paths(parts: &[&str]) -> String {
    let mut path = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for segment in parts
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
    {
        path.push('/');
        path.push_str(segment);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(Box<str>),
    Param,
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Positional comparison, no regex involved.
    Simple(Box<[Segment]>),
    Regex(Regex),
}

/// A compiled route path template such as `/users/:id/posts/:post_id`.
///
/// Templates made only of literals and `:name` segments match by comparing
/// segments; wildcards (`*`) and optional params (`:name?`) go through a
/// regex. Both forms tolerate one trailing slash.
#[derive(Debug, Clone)]
pub struct PathPattern {
    template: String,
    names: Box<[Arc<str>]>,
    matcher: Matcher,
}

impl PathPattern {
    pub fn compile(template: &str) -> Result<Self> {
        let mut names = Vec::new();
        let mut segments = Vec::new();
        let mut simple = true;

        for raw in split_segments(template) {
            match parse_segment(template, raw)? {
                Parsed::Literal => {
                    simple &= !raw.contains('*');
                    segments.push(Segment::Literal(raw.into()));
                }
                Parsed::Param { name, optional } => {
                    simple &= !optional;
                    names.push(Arc::from(name));
                    segments.push(Segment::Param);
                }
            }
        }

        let matcher = if simple {
            Matcher::Simple(segments.into_boxed_slice())
        } else {
            Matcher::Regex(build_regex(template, &mut names)?)
        };

        Ok(Self {
            template: template.to_string(),
            names: names.into_boxed_slice(),
            matcher,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Capture names in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|name| &**name)
    }

    pub fn is_simple(&self) -> bool {
        matches!(self.matcher, Matcher::Simple(_))
    }

    /// Match a request path (query already stripped) and bind its params.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        match &self.matcher {
            Matcher::Simple(layout) => self.match_segments(layout, path),
            Matcher::Regex(regex) => {
                let captures = regex.captures(path)?;
                let values = (1..captures.len()).map(|i| captures.get(i).map(|m| m.as_str()));
                Some(self.bind(values))
            }
        }
    }

    fn match_segments(&self, layout: &[Segment], path: &str) -> Option<PathParams> {
        let mut values: smallvec::SmallVec<[&str; crate::http::MAX_INLINE_PARAMS]> =
            smallvec::SmallVec::new();
        let mut request = split_segments(path);
        for segment in layout {
            let actual = request.next()?;
            match segment {
                Segment::Literal(literal) if **literal == *actual => {}
                Segment::Param if !actual.is_empty() => values.push(actual),
                _ => return None,
            }
        }
        if request.next().is_some() {
            return None;
        }
        Some(self.bind(values.into_iter().map(Some)))
    }

    fn bind<'p>(&self, mut values: impl Iterator<Item = Option<&'p str>>) -> PathParams {
        let mut params = ParamVec::new();
        match &*self.names {
            [] => {}
            [only] => {
                if let Some(Some(value)) = values.next() {
                    params.push((Arc::clone(only), decode(value)));
                }
            }
            [first, second] => {
                if let Some(Some(value)) = values.next() {
                    params.push((Arc::clone(first), decode(value)));
                }
                if let Some(Some(value)) = values.next() {
                    params.push((Arc::clone(second), decode(value)));
                }
            }
            names => {
                for (name, value) in names.iter().zip(values) {
                    if let Some(value) = value {
                        params.push((Arc::clone(name), decode(value)));
                    }
                }
            }
        }
        PathParams::new(params)
    }
}

enum Parsed<'t> {
    Literal,
    Param { name: &'t str, optional: bool },
}

fn parse_segment<'t>(template: &str, segment: &'t str) -> Result<Parsed<'t>> {
    let Some(name) = segment.strip_prefix(':') else {
        return Ok(Parsed::Literal);
    };
    let (name, optional) = match name.strip_suffix('?') {
        Some(name) => (name, true),
        None => (name, false),
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TrellisError::InvalidRoute {
            path: template.to_string(),
            reason: format!("invalid parameter segment `{segment}`"),
        });
    }
    Ok(Parsed::Param { name, optional })
}

/// Segments of a path without its leading and single trailing slash.
/// The root path yields one empty segment.
fn split_segments(path: &str) -> std::str::Split<'_, char> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    path.split('/')
}

/// Build the regex form, appending wildcard capture names to `names` in
/// their positional order.
fn build_regex(template: &str, names: &mut Vec<Arc<str>>) -> Result<Regex> {
    let mut ordered = Vec::with_capacity(names.len());
    let mut declared = names.drain(..);
    let mut pattern = String::with_capacity(template.len() + 8);
    pattern.push('^');

    for raw in split_segments(template) {
        match parse_segment(template, raw)? {
            Parsed::Param { optional: true, .. } => {
                pattern.push_str("(?:/([^/]+))?");
                ordered.extend(declared.next());
            }
            Parsed::Param { optional: false, .. } => {
                pattern.push_str("/([^/]+)");
                ordered.extend(declared.next());
            }
            Parsed::Literal if raw.is_empty() => {}
            Parsed::Literal => {
                pattern.push('/');
                for (i, part) in raw.split('*').enumerate() {
                    if i > 0 {
                        pattern.push_str("(.*)");
                        ordered.push(Arc::from(WILDCARD_PARAM));
                    }
                    pattern.push_str(&regex::escape(part));
                }
            }
        }
    }
    pattern.push_str("/?$");
    drop(declared);
    *names = ordered;

    Regex::new(&pattern).map_err(|e| TrellisError::InvalidRoute {
        path: template.to_string(),
        reason: e.to_string(),
    })
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
