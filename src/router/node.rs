use crate::error::RouteIssue;
use crate::handler::SharedHandler;
use crate::inspector::Inspector;
use std::sync::Arc;

/// Variable name carried by splat wildcards.
pub const SPLAT: &str = "*";

/// What a registration attaches to the node its path ends on.
pub(crate) enum Attachment {
    Handler(SharedHandler),
    Inspector(Arc<Inspector>),
}

/// One path segment in a method's route trie.
///
/// A node matches either one literal segment or, when it is a wildcard, any
/// segment. Named wildcards (`:id`) bind the segment they match; the splat
/// wildcard (`*`) is terminal and swallows the rest of the path.
#[derive(Default)]
pub struct RouteNode {
    segment: String,
    is_wildcard: bool,
    variable: String,
    inspectors: Vec<Arc<Inspector>>,
    children: Vec<RouteNode>,
    handler: Option<SharedHandler>,
}

impl RouteNode {
    pub fn new() -> Self {
        Self::default()
    }

    fn literal(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            ..Self::default()
        }
    }

    fn wildcard(variable: &str) -> Self {
        Self {
            is_wildcard: true,
            variable: variable.to_string(),
            ..Self::default()
        }
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn is_wildcard(&self) -> bool {
        self.is_wildcard
    }

    pub fn is_splat(&self) -> bool {
        self.is_wildcard && self.variable == SPLAT
    }

    /// Name bound by a wildcard node; empty for literal nodes.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn inspectors(&self) -> &[Arc<Inspector>] {
        &self.inspectors
    }

    pub fn children(&self) -> &[RouteNode] {
        &self.children
    }

    pub fn handler(&self) -> Option<&SharedHandler> {
        self.handler.as_ref()
    }

    /// Finds the child for a request segment: an exact literal match wins
    /// over the wildcard child.
    pub fn child(&self, segment: &str) -> Option<&RouteNode> {
        self.children
            .iter()
            .find(|child| !child.is_wildcard && child.segment == segment)
            .or_else(|| self.children.iter().find(|child| child.is_wildcard))
    }

    pub fn splat_child(&self) -> Option<&RouteNode> {
        self.children.iter().find(|child| child.is_splat())
    }

    /// Walks `segments` from this node, creating nodes as needed, and
    /// attaches `attachment` to the node the path ends on. Problems are
    /// pushed onto `issues`; apart from a non-terminal splat, which drops the
    /// route, insertion carries on with the nodes already in place.
    pub(crate) fn insert(
        &mut self,
        segments: &[&str],
        attachment: Attachment,
        route: &str,
        issues: &mut Vec<RouteIssue>,
    ) {
        let Some((&segment, rest)) = segments.split_first() else {
            self.attach(attachment, route, issues);
            return;
        };

        let child = if segment == SPLAT {
            if !rest.is_empty() {
                issues.push(RouteIssue::NonTerminalSplat {
                    route: route.to_string(),
                    remaining: rest.len(),
                });
                return;
            }
            self.wildcard_child_or_insert(SPLAT, route, issues)
        } else if let Some(variable) = segment.strip_prefix(':').filter(|v| !v.is_empty()) {
            if self.children.len() > 1 {
                issues.push(RouteIssue::AmbiguousSiblings {
                    route: route.to_string(),
                    siblings: self.children.len(),
                });
            }
            self.wildcard_child_or_insert(variable, route, issues)
        } else {
            self.literal_child_or_insert(segment)
        };
        child.insert(rest, attachment, route, issues);
    }

    fn attach(&mut self, attachment: Attachment, route: &str, issues: &mut Vec<RouteIssue>) {
        match attachment {
            Attachment::Handler(handler) => {
                if self.handler.is_some() {
                    issues.push(RouteIssue::DuplicateHandler {
                        route: route.to_string(),
                    });
                } else {
                    self.handler = Some(handler);
                }
            }
            Attachment::Inspector(inspector) => self.inspectors.push(inspector),
        }
    }

    fn wildcard_child_or_insert(
        &mut self,
        variable: &str,
        route: &str,
        issues: &mut Vec<RouteIssue>,
    ) -> &mut RouteNode {
        match self.children.iter().position(|child| child.is_wildcard) {
            Some(index) => {
                let child = &mut self.children[index];
                if child.variable != variable {
                    issues.push(RouteIssue::VariableMismatch {
                        route: route.to_string(),
                        existing: child.variable.clone(),
                        requested: variable.to_string(),
                    });
                }
                child
            }
            None => {
                self.children.push(RouteNode::wildcard(variable));
                let last = self.children.len() - 1;
                &mut self.children[last]
            }
        }
    }

    fn literal_child_or_insert(&mut self, segment: &str) -> &mut RouteNode {
        match self
            .children
            .iter()
            .position(|child| !child.is_wildcard && child.segment == segment)
        {
            Some(index) => &mut self.children[index],
            None => {
                self.children.push(RouteNode::literal(segment));
                let last = self.children.len() - 1;
                &mut self.children[last]
            }
        }
    }
}
