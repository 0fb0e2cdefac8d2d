//! Building new URL trees from navigation commands.
//!
//! # Responsibilities
//! - Turn an imperative command list (`["/team", "33", {matrix}, {outlets}]`) into a `UrlTree`
//! - Resolve relative commands (`..`, plain paths) against a route's position in the current tree
//! - Keep unrelated outlets of the current tree intact
//!
//! # Design Decisions
//! - A leading path string may contain `/` and `..`; later strings are single segments
//! - Relative positions are located inside the current tree, so commands that repeat
//!   existing segments keep the deeper outlets attached to them
//! - An outlets command must be the last command

use indexmap::IndexMap;
use thiserror::Error;

use crate::url::tree::{
    shallow_equal, Params, QueryParams, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET,
};

/// One navigation command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A path string. Only the first command is split on `/` and may carry `..`.
    Path(String),
    /// Matrix parameters for the preceding path segment.
    Matrix(Params),
    /// Per-outlet command lists. `None` clears the outlet.
    Outlets(IndexMap<String, Option<Vec<Command>>>),
}

impl Command {
    /// Build an outlets command from `(name, commands)` pairs.
    pub fn outlets<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Vec<Command>>)>,
        S: Into<String>,
    {
        Command::Outlets(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a matrix-params command from `(key, value)` pairs.
    pub fn matrix<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Command::Matrix(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<&str> for Command {
    fn from(value: &str) -> Self {
        Command::Path(value.to_string())
    }
}

impl From<String> for Command {
    fn from(value: String) -> Self {
        Command::Path(value)
    }
}

/// Error building a tree from commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("root segment cannot have matrix parameters")]
    RootMatrixParams,

    #[error("an outlets command has to be the last command")]
    OutletsNotLast,

    #[error("invalid number of '../'")]
    InvalidDoubleDots,

    #[error("matrix parameters must follow a path segment")]
    DanglingMatrixParams,
}

/// Where a relative navigation starts: the route's outlet under the root and the
/// segments consumed from the start of that outlet down to the route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePosition {
    pub outlet: String,
    pub segments: Vec<UrlSegment>,
}

struct Navigation {
    is_absolute: bool,
    double_dots: usize,
    commands: Vec<Command>,
}

impl Navigation {
    fn to_root(&self) -> bool {
        self.is_absolute && self.commands.len() == 1 && self.commands[0] == Command::Path("/".into())
    }
}

fn compute_navigation(commands: &[Command]) -> Result<Navigation, CommandError> {
    if let [Command::Path(only)] = commands {
        if only == "/" {
            return Ok(Navigation {
                is_absolute: true,
                double_dots: 0,
                commands: commands.to_vec(),
            });
        }
    }

    let mut double_dots = 0;
    let mut is_absolute = false;
    let mut res = Vec::with_capacity(commands.len());

    for (idx, cmd) in commands.iter().enumerate() {
        match cmd {
            Command::Path(path) if idx == 0 => {
                for (part_idx, part) in path.split('/').enumerate() {
                    if part_idx == 0 && part == "." {
                        continue;
                    } else if part_idx == 0 && part.is_empty() {
                        is_absolute = true;
                    } else if part == ".." {
                        double_dots += 1;
                    } else if !part.is_empty() {
                        res.push(Command::Path(part.to_string()));
                    }
                }
            }
            other => res.push(other.clone()),
        }
    }

    if is_absolute && matches!(res.first(), Some(Command::Matrix(_))) {
        return Err(CommandError::RootMatrixParams);
    }
    if let Some(pos) = res.iter().position(|c| matches!(c, Command::Outlets(_))) {
        if pos != res.len() - 1 {
            return Err(CommandError::OutletsNotLast);
        }
    }

    Ok(Navigation {
        is_absolute,
        double_dots,
        commands: res,
    })
}

/// Create a new tree by applying `commands` to `current`.
///
/// Without a `relative` position the commands apply from the root. Query
/// parameters and the fragment are taken as given; merging is the caller's job.
pub fn create_url_tree(
    current: &UrlTree,
    relative: Option<&RelativePosition>,
    commands: &[Command],
    query_params: QueryParams,
    fragment: Option<String>,
) -> Result<UrlTree, CommandError> {
    let nav = compute_navigation(commands)?;

    if nav.to_root() {
        return Ok(UrlTree::new(UrlSegmentGroup::default(), query_params, fragment));
    }

    let relative = match relative {
        Some(pos) if !nav.is_absolute => pos,
        _ => {
            if commands.is_empty() {
                return Ok(UrlTree::new(current.root.clone(), query_params, fragment));
            }
            let root = update_segment_group_children(&current.root, 0, &nav.commands)?;
            return Ok(UrlTree::new(root, query_params, fragment));
        }
    };

    let (mut key_path, mut index) = locate(&current.root, relative);
    let modifier_is_matrix = matches!(nav.commands.first(), Some(Command::Matrix(_)));
    if modifier_is_matrix {
        index = index.saturating_sub(1);
    }

    let mut double_dots = nav.double_dots;
    let mut group = group_at(&current.root, &key_path).cloned().unwrap_or_else(|| {
        UrlSegmentGroup::new(relative.segments.clone(), IndexMap::new())
    });
    while double_dots > index {
        double_dots -= index;
        if key_path.len() <= 1 {
            return Err(CommandError::InvalidDoubleDots);
        }
        key_path.pop();
        group = group_at(&current.root, &key_path)
            .cloned()
            .ok_or(CommandError::InvalidDoubleDots)?;
        index = group.segments.len();
    }
    index -= double_dots;

    let updated = update_segment_group(Some(&group), index, &nav.commands)?;
    let root = replace_at(&current.root, &key_path, updated);
    Ok(UrlTree::new(root, query_params, fragment))
}

/// Find the group that holds the last segment of `pos`, as a key path from the root.
/// Falls back to the top-level outlet when the current tree no longer lines up.
fn locate(root: &UrlSegmentGroup, pos: &RelativePosition) -> (Vec<String>, usize) {
    let mut key_path = vec![pos.outlet.clone()];
    let mut remaining: &[UrlSegment] = &pos.segments;
    let mut group = match root.child(&pos.outlet) {
        Some(g) => g,
        None => return (key_path, pos.segments.len()),
    };

    loop {
        let own = group.segments.len();
        if remaining.len() <= own {
            return (key_path, remaining.len());
        }
        match group.child(PRIMARY_OUTLET) {
            Some(child) => {
                remaining = &remaining[own..];
                key_path.push(PRIMARY_OUTLET.to_string());
                group = child;
            }
            None => return (key_path, own),
        }
    }
}

fn group_at<'a>(root: &'a UrlSegmentGroup, key_path: &[String]) -> Option<&'a UrlSegmentGroup> {
    key_path.iter().try_fold(root, |g, key| g.child(key))
}

fn replace_at(group: &UrlSegmentGroup, key_path: &[String], replacement: UrlSegmentGroup) -> UrlSegmentGroup {
    match key_path.split_first() {
        None => replacement,
        Some((key, rest)) => {
            let mut out = group.clone();
            let current = group.child(key).cloned().unwrap_or_default();
            out.children.insert(key.clone(), replace_at(&current, rest, replacement));
            out
        }
    }
}

fn update_segment_group(
    group: Option<&UrlSegmentGroup>,
    start_index: usize,
    commands: &[Command],
) -> Result<UrlSegmentGroup, CommandError> {
    let empty = UrlSegmentGroup::default();
    let group = group.unwrap_or(&empty);

    if group.segments.is_empty() && group.has_children() {
        return update_segment_group_children(group, start_index, commands);
    }

    let m = prefixed_with(group, start_index, commands);
    let sliced = &commands[m.command_index.min(commands.len())..];

    if m.matched && m.path_index < group.segments.len() {
        let mut children = IndexMap::new();
        children.insert(
            PRIMARY_OUTLET.to_string(),
            UrlSegmentGroup::new(group.segments[m.path_index..].to_vec(), group.children.clone()),
        );
        let split = UrlSegmentGroup::new(group.segments[..m.path_index].to_vec(), children);
        update_segment_group_children(&split, 0, sliced)
    } else if m.matched && sliced.is_empty() {
        Ok(UrlSegmentGroup::new(group.segments.clone(), IndexMap::new()))
    } else if m.matched && !group.has_children() {
        create_new_segment_group(group, start_index, commands)
    } else if m.matched {
        update_segment_group_children(group, 0, sliced)
    } else {
        create_new_segment_group(group, start_index, commands)
    }
}

fn update_segment_group_children(
    group: &UrlSegmentGroup,
    start_index: usize,
    commands: &[Command],
) -> Result<UrlSegmentGroup, CommandError> {
    if commands.is_empty() {
        return Ok(UrlSegmentGroup::new(group.segments.clone(), IndexMap::new()));
    }

    let outlets = get_outlets(commands);

    // Named outlets addressed from an empty-path primary child belong to that child.
    let targets_named = outlets.keys().any(|k| k != PRIMARY_OUTLET);
    if targets_named && group.number_of_children() == 1 {
        if let Some(primary) = group.child(PRIMARY_OUTLET) {
            if primary.segments.is_empty() {
                let nested = update_segment_group_children(primary, start_index, commands)?;
                return Ok(UrlSegmentGroup::new(group.segments.clone(), nested.children));
            }
        }
    }

    let mut children = IndexMap::new();
    for (outlet, cmds) in &outlets {
        if let Some(cmds) = cmds {
            let updated = update_segment_group(group.child(outlet), start_index, cmds)?;
            children.insert(outlet.clone(), updated);
        }
    }
    for (outlet, child) in &group.children {
        if !outlets.contains_key(outlet) {
            children.insert(outlet.clone(), child.clone());
        }
    }
    // Keep the primary outlet first for stable printing.
    if let Some(idx) = children.get_index_of(PRIMARY_OUTLET) {
        children.move_index(idx, 0);
    }
    Ok(UrlSegmentGroup::new(group.segments.clone(), children))
}

struct PrefixMatch {
    matched: bool,
    path_index: usize,
    command_index: usize,
}

fn prefixed_with(group: &UrlSegmentGroup, start_index: usize, commands: &[Command]) -> PrefixMatch {
    let no_match = PrefixMatch {
        matched: false,
        path_index: 0,
        command_index: 0,
    };
    let mut command_index = 0;
    let mut path_index = start_index;

    while path_index < group.segments.len() {
        if command_index >= commands.len() {
            return no_match;
        }
        let segment = &group.segments[path_index];
        let curr = match &commands[command_index] {
            Command::Outlets(_) => break,
            Command::Matrix(_) => return no_match,
            Command::Path(p) => p,
        };
        match commands.get(command_index + 1) {
            Some(Command::Matrix(params)) => {
                if !compare(curr, params, segment) {
                    return no_match;
                }
                command_index += 2;
            }
            _ => {
                if !compare(curr, &Params::new(), segment) {
                    return no_match;
                }
                command_index += 1;
            }
        }
        path_index += 1;
    }

    PrefixMatch {
        matched: true,
        path_index,
        command_index,
    }
}

fn compare(path: &str, params: &Params, segment: &UrlSegment) -> bool {
    path == segment.path && shallow_equal(params, &segment.parameters)
}

fn create_new_segment_group(
    group: &UrlSegmentGroup,
    start_index: usize,
    commands: &[Command],
) -> Result<UrlSegmentGroup, CommandError> {
    let mut paths: Vec<UrlSegment> = group.segments[..start_index.min(group.segments.len())].to_vec();
    let mut i = 0;

    while i < commands.len() {
        match &commands[i] {
            Command::Outlets(outlets) => {
                let children = create_new_segment_children(outlets)?;
                return Ok(UrlSegmentGroup::new(paths, children));
            }
            Command::Matrix(params) if i == 0 => {
                let existing = group
                    .segments
                    .get(start_index)
                    .ok_or(CommandError::DanglingMatrixParams)?;
                paths.push(UrlSegment::new(existing.path.clone(), params.clone()));
                i += 1;
            }
            Command::Matrix(_) => return Err(CommandError::DanglingMatrixParams),
            Command::Path(curr) => match commands.get(i + 1) {
                Some(Command::Matrix(params)) => {
                    paths.push(UrlSegment::new(curr.clone(), params.clone()));
                    i += 2;
                }
                _ => {
                    paths.push(UrlSegment::path(curr.clone()));
                    i += 1;
                }
            },
        }
    }

    Ok(UrlSegmentGroup::new(paths, IndexMap::new()))
}

fn create_new_segment_children(
    outlets: &IndexMap<String, Option<Vec<Command>>>,
) -> Result<IndexMap<String, UrlSegmentGroup>, CommandError> {
    let mut children = IndexMap::new();
    for (outlet, cmds) in outlets {
        if let Some(cmds) = cmds {
            let group = create_new_segment_group(&UrlSegmentGroup::default(), 0, cmds)?;
            children.insert(outlet.clone(), group);
        }
    }
    Ok(children)
}

fn get_outlets(commands: &[Command]) -> IndexMap<String, Option<Vec<Command>>> {
    if let Some(Command::Outlets(outlets)) = commands.first() {
        return outlets.clone();
    }
    let mut map = IndexMap::new();
    map.insert(PRIMARY_OUTLET.to_string(), Some(commands.to_vec()));
    map
}
