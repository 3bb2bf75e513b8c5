//! The owning wrapper around one [`FlowchartAst`]: fluent mutation operations
//! and graph queries.
//!
//! Mutations return `&mut Self` for chaining. Operations naming absent
//! entities are no-ops; chain operations on a broken (non-contiguous or
//! missing) node run detect the break and do nothing rather than guess.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ast::*;
use crate::error::Result;
use crate::parser;
use crate::render::{self, RenderOptions};

/// Styling for programmatically added links; defaults match a plain `-->`.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub arrow: ArrowType,
    pub stroke: Stroke,
    pub length: usize,
    pub text: Option<String>,
}

impl Default for LinkOptions {
    fn default() -> Self {
        LinkOptions {
            arrow: ArrowType::Point,
            stroke: Stroke::Normal,
            length: 1,
            text: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Flowchart {
    ast: FlowchartAst,
}

impl Flowchart {
    pub fn new(direction: Direction) -> Flowchart {
        Flowchart {
            ast: FlowchartAst::new(direction),
        }
    }

    pub fn parse(input: &str) -> Result<Flowchart> {
        Ok(Flowchart {
            ast: parser::parse(input)?,
        })
    }

    pub fn from_ast(ast: FlowchartAst) -> Flowchart {
        Flowchart { ast }
    }

    pub fn render(&self, options: &RenderOptions) -> Result<String> {
        render::render(&self.ast, options)
    }

    // -- accessors ----------------------------------------------------------

    pub fn ast(&self) -> &FlowchartAst {
        &self.ast
    }

    pub fn into_ast(self) -> FlowchartAst {
        self.ast
    }

    pub fn direction(&self) -> Direction {
        self.ast.direction
    }

    pub fn nodes(&self) -> &[Node] {
        &self.ast.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.ast.node(id)
    }

    pub fn links(&self) -> &[Link] {
        &self.ast.links
    }

    pub fn subgraphs(&self) -> &[Subgraph] {
        &self.ast.subgraphs
    }

    pub fn class_defs(&self) -> &[ClassDef] {
        &self.ast.class_defs
    }

    pub fn classes_for(&self, id: &str) -> &[String] {
        self.ast.classes_for(id)
    }

    pub fn clicks(&self) -> &[Click] {
        &self.ast.clicks
    }

    pub fn link_styles(&self) -> &[LinkStyle] {
        &self.ast.link_styles
    }

    // -- node and link edits ------------------------------------------------

    /// Insert or overwrite a node with the default square shape.
    pub fn add_node(&mut self, id: &str, text: Option<&str>) -> &mut Self {
        self.add_node_with_shape(id, text, NodeShape::Square)
    }

    pub fn add_node_with_shape(
        &mut self,
        id: &str,
        text: Option<&str>,
        shape: NodeShape,
    ) -> &mut Self {
        self.ast.upsert_node(Node {
            id: id.to_string(),
            shape,
            text: text.map(str::to_string),
        });
        self
    }

    /// Delete a node along with every touching link, its subgraph membership,
    /// class assignment, and click entries. With `reconnect`, a link is
    /// synthesized for every incoming-source/outgoing-target pair (self-loops
    /// skipped), copying stroke, arrow type and length from the incoming link
    /// and dropping its text.
    pub fn remove_node(&mut self, id: &str, reconnect: bool) -> &mut Self {
        if !self.ast.has_node(id) {
            return self;
        }
        let mut synthesized = Vec::new();
        if reconnect {
            let incoming: Vec<&Link> = self
                .ast
                .links
                .iter()
                .filter(|l| l.target == id && l.source != id)
                .collect();
            let outgoing: Vec<&Link> = self
                .ast
                .links
                .iter()
                .filter(|l| l.source == id && l.target != id)
                .collect();
            for inc in &incoming {
                for out in &outgoing {
                    if inc.source != out.target {
                        synthesized.push(Link {
                            source: inc.source.clone(),
                            target: out.target.clone(),
                            arrow: inc.arrow,
                            stroke: inc.stroke,
                            length: inc.length,
                            text: None,
                        });
                    }
                }
            }
        }
        self.purge_node(id);
        self.ast.links.extend(synthesized);
        self
    }

    pub fn add_link(&mut self, source: &str, target: &str, options: LinkOptions) -> &mut Self {
        self.ast.ensure_node(source);
        self.ast.ensure_node(target);
        self.ast.links.push(Link {
            source: source.to_string(),
            target: target.to_string(),
            arrow: options.arrow,
            stroke: options.stroke,
            length: options.length.max(1),
            text: options.text,
        });
        self
    }

    /// Remove every direct `source -> target` link; a no-op when none exist.
    pub fn remove_link(&mut self, source: &str, target: &str) -> &mut Self {
        self.ast
            .links
            .retain(|l| !(l.source == source && l.target == target));
        self
    }

    /// Split an existing `source -> target` link around a new node: the
    /// original link is retargeted to `new_id` keeping all its styling and
    /// text, and a styled but textless `new_id -> target` link follows it.
    /// Without an existing link, both halves get default styling.
    pub fn insert_between(
        &mut self,
        new_id: &str,
        source: &str,
        target: &str,
        text: Option<&str>,
    ) -> &mut Self {
        if !self.ast.has_node(new_id) {
            self.ast.upsert_node(Node {
                id: new_id.to_string(),
                shape: NodeShape::Square,
                text: text.map(str::to_string),
            });
        }
        self.ast.ensure_node(source);
        self.ast.ensure_node(target);

        let existing = self
            .ast
            .links
            .iter()
            .position(|l| l.source == source && l.target == target);
        match existing {
            Some(i) => {
                let second = Link {
                    source: new_id.to_string(),
                    target: target.to_string(),
                    arrow: self.ast.links[i].arrow,
                    stroke: self.ast.links[i].stroke,
                    length: self.ast.links[i].length,
                    text: None,
                };
                self.ast.links[i].target = new_id.to_string();
                self.ast.links.insert(i + 1, second);
            }
            None => {
                self.ast.links.push(Link::plain(source, new_id));
                self.ast.links.push(Link::plain(new_id, target));
            }
        }
        self
    }

    /// Remove a contiguous node run, reconnecting every external incoming
    /// link of the first node to every external outgoing link of the last
    /// (self-loops skipped). A broken run is a no-op.
    pub fn yank_chain(&mut self, ids: &[&str]) -> &mut Self {
        if !self.is_run(ids) {
            return self;
        }
        let members: HashSet<&str> = ids.iter().copied().collect();
        let first = ids[0];
        let last = ids[ids.len() - 1];

        let mut synthesized = Vec::new();
        let incoming: Vec<&Link> = self
            .ast
            .links
            .iter()
            .filter(|l| l.target == first && !members.contains(l.source.as_str()))
            .collect();
        let outgoing: Vec<&Link> = self
            .ast
            .links
            .iter()
            .filter(|l| l.source == last && !members.contains(l.target.as_str()))
            .collect();
        for inc in &incoming {
            for out in &outgoing {
                if inc.source != out.target {
                    synthesized.push(Link {
                        source: inc.source.clone(),
                        target: out.target.clone(),
                        arrow: inc.arrow,
                        stroke: inc.stroke,
                        length: inc.length,
                        text: None,
                    });
                }
            }
        }
        for id in ids {
            self.purge_node(id);
        }
        self.ast.links.extend(synthesized);
        self
    }

    /// Wire an existing run between `source` and `target`: any direct
    /// `source -> target` links are removed, and `source -> first(ids)` and
    /// `last(ids) -> target` are added. Links among `ids` are untouched.
    pub fn splice_chain(&mut self, ids: &[&str], source: &str, target: &str) -> &mut Self {
        if ids.is_empty()
            || !self.ast.has_node(source)
            || !self.ast.has_node(target)
            || ids.iter().any(|id| !self.ast.has_node(id))
        {
            return self;
        }
        self.remove_link(source, target);
        self.ast.links.push(Link::plain(source, ids[0]));
        self.ast.links.push(Link::plain(ids[ids.len() - 1], target));
        self
    }

    /// Flip the direction of each consecutive pair's link in place. The whole
    /// run is validated first; a missing pair makes this a no-op.
    pub fn reverse_chain(&mut self, ids: &[&str]) -> &mut Self {
        let mut positions = Vec::new();
        for pair in ids.windows(2) {
            match self
                .ast
                .links
                .iter()
                .position(|l| l.source == pair[0] && l.target == pair[1])
            {
                Some(i) => positions.push(i),
                None => return self,
            }
        }
        for i in positions {
            let link = &mut self.ast.links[i];
            std::mem::swap(&mut link.source, &mut link.target);
        }
        self
    }

    /// Copy a run and its internal links into a new, independent graph, then
    /// yank the run from this one. A broken run yields an empty graph and
    /// leaves this one untouched.
    pub fn extract_chain(&mut self, ids: &[&str]) -> Flowchart {
        if !self.is_run(ids) {
            return Flowchart::new(self.ast.direction);
        }
        let members: HashSet<&str> = ids.iter().copied().collect();
        let mut extracted = FlowchartAst::new(self.ast.direction);
        for id in ids {
            if let Some(node) = self.ast.node(id) {
                extracted.nodes.push(node.clone());
            }
        }
        extracted.links = self
            .ast
            .links
            .iter()
            .filter(|l| {
                members.contains(l.source.as_str()) && members.contains(l.target.as_str())
            })
            .cloned()
            .collect();
        self.yank_chain(ids);
        Flowchart { ast: extracted }
    }

    /// Cut every link entering `ids` from outside, then hang the set's root
    /// members (those with no incoming link from another member) off
    /// `new_parent`, creating it if needed.
    pub fn rebase_nodes(&mut self, ids: &[&str], new_parent: &str) -> &mut Self {
        let members: Vec<&str> = ids
            .iter()
            .copied()
            .filter(|id| self.ast.has_node(id))
            .collect();
        if members.is_empty() {
            return self;
        }
        let member_set: HashSet<&str> = members.iter().copied().collect();
        self.ast.links.retain(|l| {
            !(member_set.contains(l.target.as_str()) && !member_set.contains(l.source.as_str()))
        });
        let roots: Vec<&str> = members
            .iter()
            .copied()
            .filter(|id| {
                !self
                    .ast
                    .links
                    .iter()
                    .any(|l| l.target == *id && member_set.contains(l.source.as_str()))
            })
            .collect();
        self.ast.ensure_node(new_parent);
        for root in roots {
            self.ast.links.push(Link::plain(new_parent, root));
        }
        self
    }

    // -- subgraph membership --------------------------------------------------

    /// Add a subgraph, or retitle it when the id already exists.
    pub fn add_subgraph(&mut self, id: &str, title: Option<&str>) -> &mut Self {
        match self.ast.subgraphs.iter_mut().find(|sg| sg.id == id) {
            Some(sg) => sg.title = title.map(str::to_string),
            None => self.ast.subgraphs.push(Subgraph {
                id: id.to_string(),
                title: title.map(str::to_string),
                direction: None,
                nodes: Vec::new(),
            }),
        }
        self
    }

    /// Move a node into a subgraph; a node belongs to at most one, so any
    /// previous membership is dropped.
    pub fn add_to_subgraph(&mut self, subgraph_id: &str, node_id: &str) -> &mut Self {
        if !self.ast.has_node(node_id)
            || !self.ast.subgraphs.iter().any(|sg| sg.id == subgraph_id)
        {
            return self;
        }
        self.remove_from_subgraph(node_id);
        if let Some(sg) = self.ast.subgraphs.iter_mut().find(|sg| sg.id == subgraph_id) {
            sg.nodes.push(node_id.to_string());
        }
        self
    }

    pub fn remove_from_subgraph(&mut self, node_id: &str) -> &mut Self {
        for sg in &mut self.ast.subgraphs {
            sg.nodes.retain(|n| n != node_id);
        }
        self
    }

    // -- decorations ----------------------------------------------------------

    pub fn set_class_def(&mut self, name: &str, styles: &[(&str, &str)]) -> &mut Self {
        let def = ClassDef {
            name: name.to_string(),
            styles: styles
                .iter()
                .map(|(p, v)| (p.to_string(), v.to_string()))
                .collect(),
        };
        match self.ast.class_defs.iter_mut().find(|d| d.name == name) {
            Some(existing) => *existing = def,
            None => self.ast.class_defs.push(def),
        }
        self
    }

    pub fn add_class(&mut self, node_id: &str, class: &str) -> &mut Self {
        if self.ast.has_node(node_id) {
            self.ast.add_class(node_id, class);
        }
        self
    }

    pub fn set_click_href(&mut self, node_id: &str, url: &str, target: Option<&str>) -> &mut Self {
        self.set_click(Click {
            node: node_id.to_string(),
            action: ClickAction::Href {
                url: url.to_string(),
                target: target.map(str::to_string),
            },
        })
    }

    pub fn set_click_call(&mut self, node_id: &str, name: &str, args: Option<&str>) -> &mut Self {
        self.set_click(Click {
            node: node_id.to_string(),
            action: ClickAction::Call {
                name: name.to_string(),
                args: args.map(str::to_string),
            },
        })
    }

    fn set_click(&mut self, click: Click) -> &mut Self {
        if !self.ast.has_node(&click.node) {
            return self;
        }
        match self.ast.clicks.iter_mut().find(|c| c.node == click.node) {
            Some(existing) => *existing = click,
            None => self.ast.clicks.push(click),
        }
        self
    }

    pub fn set_link_style(
        &mut self,
        index: LinkIndex,
        styles: &[(&str, &str)],
        interpolate: Option<&str>,
    ) -> &mut Self {
        let style = LinkStyle {
            index,
            styles: styles
                .iter()
                .map(|(p, v)| (p.to_string(), v.to_string()))
                .collect(),
            interpolate: interpolate.map(str::to_string),
        };
        match self.ast.link_styles.iter_mut().find(|s| s.index == index) {
            Some(existing) => *existing = style,
            None => self.ast.link_styles.push(style),
        }
        self
    }

    pub fn set_title(&mut self, title: Option<&str>) -> &mut Self {
        self.ast.title = title.map(str::to_string);
        self
    }

    pub fn set_acc_description(&mut self, text: Option<&str>) -> &mut Self {
        self.ast.acc_description = text.map(str::to_string);
        self
    }

    // -- queries --------------------------------------------------------------

    /// Every node reachable from `start` (inclusive), in breadth-first
    /// discovery order over the stored link order.
    pub fn reachable(&self, start: &str) -> Vec<String> {
        self.bfs(start, |link| (&link.source, &link.target))
    }

    /// Every node that can reach `target` (inclusive), breadth-first over the
    /// reverse adjacency.
    pub fn ancestors(&self, target: &str) -> Vec<String> {
        self.bfs(target, |link| (&link.target, &link.source))
    }

    fn bfs<'a>(&'a self, start: &str, edge: impl Fn(&'a Link) -> (&'a String, &'a String)) -> Vec<String> {
        if !self.ast.has_node(start) {
            return Vec::new();
        }
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for link in &self.ast.links {
            let (from, to) = edge(link);
            adjacency.entry(from.as_str()).or_default().push(to.as_str());
        }
        let mut visited: Vec<String> = vec![start.to_string()];
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        if let Some(node) = self.ast.node(start) {
            seen.insert(node.id.as_str());
            queue.push_back(node.id.as_str());
        }
        while let Some(current) = queue.pop_front() {
            for &next in adjacency.get(current).into_iter().flatten() {
                if seen.insert(next) {
                    visited.push(next.to_string());
                    queue.push_back(next);
                }
            }
        }
        visited
    }

    /// First-discovered shortest node sequence from `source` to `target`,
    /// inclusive of both ends; empty when unreachable.
    pub fn path(&self, source: &str, target: &str) -> Vec<String> {
        if !self.ast.has_node(source) || !self.ast.has_node(target) {
            return Vec::new();
        }
        if source == target {
            return vec![source.to_string()];
        }
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for link in &self.ast.links {
            adjacency
                .entry(link.source.as_str())
                .or_default()
                .push(link.target.as_str());
        }
        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        parent.insert(source, source);
        queue.push_back(source);
        while let Some(current) = queue.pop_front() {
            for &next in adjacency.get(current).into_iter().flatten() {
                if parent.contains_key(next) {
                    continue;
                }
                parent.insert(next, current);
                if next == target {
                    let mut path = vec![next.to_string()];
                    let mut step = current;
                    while step != source {
                        path.push(step.to_string());
                        step = parent[step];
                    }
                    path.push(source.to_string());
                    path.reverse();
                    return path;
                }
                queue.push_back(next);
            }
        }
        Vec::new()
    }

    /// Walk forward from `start`, requiring exactly one outgoing link per
    /// step; the full sequence if the walk reaches `end`, otherwise empty.
    pub fn chain(&self, start: &str, end: &str) -> Vec<String> {
        if !self.ast.has_node(start) || !self.ast.has_node(end) {
            return Vec::new();
        }
        let mut sequence = vec![start.to_string()];
        if start == end {
            return sequence;
        }
        let bound = self.ast.nodes.len();
        let mut current = start.to_string();
        while sequence.len() <= bound {
            let mut outgoing = self.ast.links.iter().filter(|l| l.source == current);
            let next = match (outgoing.next(), outgoing.next()) {
                (Some(link), None) => link.target.clone(),
                _ => return Vec::new(),
            };
            sequence.push(next.clone());
            if next == end {
                return sequence;
            }
            current = next;
        }
        Vec::new()
    }

    // -- internals ------------------------------------------------------------

    /// True when `ids` is a non-empty run of existing nodes with a stored
    /// link between each consecutive pair.
    fn is_run(&self, ids: &[&str]) -> bool {
        if ids.is_empty() || ids.iter().any(|id| !self.ast.has_node(id)) {
            return false;
        }
        ids.windows(2).all(|pair| {
            self.ast
                .links
                .iter()
                .any(|l| l.source == pair[0] && l.target == pair[1])
        })
    }

    fn purge_node(&mut self, id: &str) {
        self.ast.nodes.retain(|n| n.id != id);
        self.ast.links.retain(|l| l.source != id && l.target != id);
        for sg in &mut self.ast.subgraphs {
            sg.nodes.retain(|n| n != id);
        }
        self.ast.classes.retain(|(node, _)| node != id);
        self.ast.clicks.retain(|c| c.node != id);
    }
}
