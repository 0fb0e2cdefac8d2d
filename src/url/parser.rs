//! URL string parser.
//!
//! Grammar, informally:
//! ```text
//! url      := '/'? children? ('?' query)? ('#' fragment)?
//! children := segment ('/' segment)* ('/(' parens)? ('(' parens)?
//! segment  := path (';' key ('=' value)?)*
//! parens   := (outlet ':')? children ('//' (outlet ':')? children)* ')'
//! ```

use indexmap::IndexMap;

use crate::url::serializer::{decode, decode_query};
use crate::url::tree::{Params, QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};
use crate::url::MalformedUrlError;

/// Single-pass cursor over a URL string.
pub(crate) struct UrlParser<'a> {
    url: &'a str,
    remaining: &'a str,
}

fn take_while_not<'a>(s: &'a str, stops: &[char]) -> &'a str {
    let end = s.find(|c: char| stops.contains(&c)).unwrap_or(s.len());
    &s[..end]
}

fn match_segments(s: &str) -> &str {
    take_while_not(s, &['/', '(', ')', '?', ';', '#'])
}

fn match_matrix_key(s: &str) -> &str {
    take_while_not(s, &['/', '(', ')', '?', ';', '=', '#'])
}

fn match_query_key(s: &str) -> &str {
    take_while_not(s, &['=', '?', '&', '#'])
}

fn match_query_value(s: &str) -> &str {
    take_while_not(s, &['&', '#'])
}

impl<'a> UrlParser<'a> {
    pub(crate) fn new(url: &'a str) -> Self {
        Self { url, remaining: url }
    }

    fn error(&self, reason: impl Into<String>) -> MalformedUrlError {
        MalformedUrlError {
            url: self.url.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse_root(mut self) -> Result<UrlTree, MalformedUrlError> {
        if let Some(c) = self.url.chars().find(|c| c.is_control()) {
            return Err(self.error(format!("illegal character {:?}", c)));
        }

        let root = self.parse_root_segment()?;
        let query_params = self.parse_query_params();
        let fragment = self.parse_fragment();

        if !self.remaining.is_empty() {
            return Err(self.error(format!("unexpected input '{}'", self.remaining)));
        }

        Ok(UrlTree::new(root, query_params, fragment))
    }

    fn peek_starts_with(&self, s: &str) -> bool {
        self.remaining.starts_with(s)
    }

    fn consume_optional(&mut self, s: &str) -> bool {
        if self.peek_starts_with(s) {
            self.remaining = &self.remaining[s.len()..];
            true
        } else {
            false
        }
    }

    fn capture(&mut self, s: &str) -> Result<(), MalformedUrlError> {
        if self.consume_optional(s) {
            Ok(())
        } else {
            Err(self.error(format!("expected \"{}\"", s)))
        }
    }

    fn parse_root_segment(&mut self) -> Result<UrlSegmentGroup, MalformedUrlError> {
        self.consume_optional("/");
        if self.remaining.is_empty() || self.peek_starts_with("?") || self.peek_starts_with("#") {
            return Ok(UrlSegmentGroup::default());
        }
        Ok(UrlSegmentGroup::new(Vec::new(), self.parse_children()?))
    }

    fn parse_query_params(&mut self) -> QueryParams {
        let mut params = QueryParams::new();
        if self.consume_optional("?") {
            loop {
                self.parse_query_param(&mut params);
                if !self.consume_optional("&") {
                    break;
                }
            }
        }
        params
    }

    fn parse_fragment(&mut self) -> Option<String> {
        if self.consume_optional("#") {
            let fragment = decode(self.remaining);
            self.remaining = "";
            Some(fragment)
        } else {
            None
        }
    }

    fn parse_children(&mut self) -> Result<IndexMap<String, UrlSegmentGroup>, MalformedUrlError> {
        if self.remaining.is_empty() {
            return Ok(IndexMap::new());
        }

        self.consume_optional("/");

        let mut segments = Vec::new();
        if !self.peek_starts_with("(") {
            segments.push(self.parse_segment()?);
        }

        while self.peek_starts_with("/") && !self.peek_starts_with("//") && !self.peek_starts_with("/(") {
            self.capture("/")?;
            segments.push(self.parse_segment()?);
        }

        let mut children = IndexMap::new();
        if self.peek_starts_with("/(") {
            self.capture("/")?;
            children = self.parse_parens(true)?;
        }

        let mut res = IndexMap::new();
        if self.peek_starts_with("(") {
            res = self.parse_parens(false)?;
        }

        if !segments.is_empty() || !children.is_empty() {
            // Primary goes first so the printed form matches the parsed one.
            let mut ordered = IndexMap::with_capacity(res.len() + 1);
            ordered.insert(PRIMARY_OUTLET.to_string(), UrlSegmentGroup::new(segments, children));
            for (name, group) in res {
                ordered.entry(name).or_insert(group);
            }
            res = ordered;
        }

        Ok(res)
    }

    fn parse_segment(&mut self) -> Result<UrlSegment, MalformedUrlError> {
        let path = match_segments(self.remaining);
        if path.is_empty() && self.peek_starts_with(";") {
            return Err(self.error(format!(
                "empty path url segment cannot have parameters: '{}'",
                self.remaining
            )));
        }
        self.capture(path)?;
        Ok(UrlSegment::new(decode(path), self.parse_matrix_params()))
    }

    fn parse_matrix_params(&mut self) -> Params {
        let mut params = Params::new();
        while self.consume_optional(";") {
            self.parse_param(&mut params);
        }
        params
    }

    fn parse_param(&mut self, params: &mut Params) {
        let key = match_matrix_key(self.remaining);
        if key.is_empty() {
            return;
        }
        self.remaining = &self.remaining[key.len()..];

        let mut value = "";
        if self.consume_optional("=") {
            value = match_segments(self.remaining);
            self.remaining = &self.remaining[value.len()..];
        }

        params.insert(decode(key), decode(value));
    }

    fn parse_query_param(&mut self, params: &mut QueryParams) {
        let key = match_query_key(self.remaining);
        if key.is_empty() {
            return;
        }
        self.remaining = &self.remaining[key.len()..];

        let mut value = "";
        if self.consume_optional("=") {
            value = match_query_value(self.remaining);
            self.remaining = &self.remaining[value.len()..];
        }

        let key = decode_query(key);
        let value = decode_query(value);
        match params.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                params.insert(key, QueryValue::Single(value));
            }
        }
    }

    fn parse_parens(&mut self, allow_primary: bool) -> Result<IndexMap<String, UrlSegmentGroup>, MalformedUrlError> {
        let mut segments = IndexMap::new();
        self.capture("(")?;

        let mut closed = false;
        while !self.remaining.is_empty() {
            if self.consume_optional(")") {
                closed = true;
                break;
            }

            let path = match_segments(self.remaining);
            let next = self.remaining[path.len()..].chars().next();
            if !matches!(next, Some('/') | Some(')') | Some(';')) {
                return Err(self.error("unbalanced outlet group"));
            }

            let outlet = match path.find(':') {
                Some(idx) => {
                    let name = &path[..idx];
                    self.capture(name)?;
                    self.capture(":")?;
                    name.to_string()
                }
                None if allow_primary => PRIMARY_OUTLET.to_string(),
                None => return Err(self.error(format!("outlet name missing before '{}'", path))),
            };

            let mut children = self.parse_children()?;
            let group = if children.len() == 1 && children.contains_key(PRIMARY_OUTLET) {
                children.shift_remove(PRIMARY_OUTLET).unwrap_or_default()
            } else {
                UrlSegmentGroup::new(Vec::new(), children)
            };
            segments.insert(outlet, group);
            self.consume_optional("//");
        }

        if !closed {
            return Err(self.error("missing ')'"));
        }
        Ok(segments)
    }
}
