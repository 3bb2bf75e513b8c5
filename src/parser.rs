//! Winnow parser for the Mermaid flowchart DSL.
//!
//! `parse` either returns a complete [`FlowchartAst`] or a parse error naming
//! the offending line; it never returns a partial AST. The grammar accepts
//! every textual form the renderer can produce under any option combination.

use winnow::ascii::{digit1, line_ending, space0, space1};
use winnow::combinator::{alt, eof, opt, peek, preceded, repeat, separated, terminated};
use winnow::prelude::*;
use winnow::token::{any, literal, one_of, take_until, take_while};

use crate::ast::*;
use crate::error::Error;

pub fn parse(input: &str) -> Result<FlowchartAst, Error> {
    let mut rest = input;
    let ast = flowchart(&mut rest).map_err(|_| syntax_error(rest))?;
    if !rest.trim().is_empty() {
        return Err(syntax_error(rest));
    }
    Ok(ast)
}

fn syntax_error(rest: &str) -> Error {
    let context = rest.lines().next().unwrap_or("").trim();
    let context = match context.char_indices().nth(40) {
        Some((i, _)) => format!("{}...", &context[..i]),
        None => context.to_string(),
    };
    Error::parse(format!("unexpected `{context}`"))
}

// ---------------------------------------------------------------------------
// grammar
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct NodeRef {
    id: String,
    shape: Option<(NodeShape, String)>,
    classes: Vec<String>,
}

#[derive(Debug)]
struct LinkSpec {
    arrow: ArrowType,
    stroke: Stroke,
    length: usize,
    text: Option<String>,
}

/// One source-level statement of nodes and links: `a --> b & c --> d`.
#[derive(Debug)]
struct ChainStmt {
    head: Vec<NodeRef>,
    hops: Vec<(LinkSpec, Vec<NodeRef>)>,
}

#[derive(Debug)]
struct SubgraphBlock {
    id: String,
    title: Option<String>,
    direction: Option<Direction>,
    lines: Vec<ChainStmt>,
}

#[derive(Debug)]
enum Line {
    Chain(ChainStmt),
    Subgraph(SubgraphBlock),
    ClassDef(ClassDef),
    ClassAssign {
        nodes: Vec<String>,
        classes: Vec<String>,
    },
    Click(Click),
    LinkStyle(LinkStyle),
    AccDescr(String),
}

fn flowchart(input: &mut &str) -> winnow::Result<FlowchartAst> {
    skip_trivia(input)?;
    let title = opt(front_matter).parse_next(input)?.flatten();
    skip_trivia(input)?;

    space0.parse_next(input)?;
    alt(("flowchart", "graph")).parse_next(input)?;
    space1.parse_next(input)?;
    let direction = direction_token.parse_next(input)?;
    end_of_line.parse_next(input)?;

    let lines: Vec<Option<Line>> = repeat(0.., line).parse_next(input)?;

    let mut ast = FlowchartAst::new(direction);
    ast.title = title;
    for line in lines.into_iter().flatten() {
        apply_line(&mut ast, line);
    }
    Ok(ast)
}

fn skip_trivia(input: &mut &str) -> winnow::Result<()> {
    loop {
        let skipped = opt(alt((
            (space0, line_ending).void(),
            (space0, comment_line).void(),
        )))
        .parse_next(input)?;
        if skipped.is_none() {
            return Ok(());
        }
    }
}

/// `---` / `title: …` / `---` before the diagram header.
fn front_matter(input: &mut &str) -> winnow::Result<Option<String>> {
    ("---", space0, line_ending).parse_next(input)?;
    let mut title = None;
    loop {
        space0.parse_next(input)?;
        let closed = opt(("---", space0, alt((line_ending.void(), eof.void()))))
            .parse_next(input)?;
        if closed.is_some() {
            return Ok(title);
        }
        if input.is_empty() {
            return Err(winnow::error::ParserError::from_input(input));
        }
        if opt(line_ending).parse_next(input)?.is_some() {
            continue;
        }
        ("title", space0, ':', space0).parse_next(input)?;
        let text = rest_of_line.parse_next(input)?;
        title = Some(text);
    }
}

fn line(input: &mut &str) -> winnow::Result<Option<Line>> {
    space0.parse_next(input)?;

    if input.is_empty() {
        return Err(winnow::error::ParserError::from_input(input));
    }

    alt((
        line_ending.map(|_| None),
        comment_line.map(|_| None),
        subgraph_block.map(|b| Some(Line::Subgraph(b))),
        class_def_line.map(Some),
        class_line.map(Some),
        click_line.map(Some),
        link_style_line.map(Some),
        acc_descr_line.map(Some),
        chain_line.map(|c| Some(Line::Chain(c))),
    ))
    .parse_next(input)
}

fn comment_line(input: &mut &str) -> winnow::Result<()> {
    ("%%", till_line_end, alt((line_ending.void(), eof.void())))
        .void()
        .parse_next(input)
}

fn end_of_line(input: &mut &str) -> winnow::Result<()> {
    space0.parse_next(input)?;
    alt((line_ending.void(), eof.void())).parse_next(input)
}

fn till_line_end<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(0.., |c: char| c != '\n' && c != '\r').parse_next(input)
}

fn rest_of_line(input: &mut &str) -> winnow::Result<String> {
    let text = till_line_end.parse_next(input)?;
    opt(line_ending).parse_next(input)?;
    Ok(text.trim_end().to_string())
}

fn direction_token(input: &mut &str) -> winnow::Result<Direction> {
    let token = take_while(2..=2, |c: char| c.is_ascii_uppercase()).parse_next(input)?;
    match Direction::from_token(token) {
        Some(direction) => Ok(direction),
        None => Err(winnow::error::ParserError::from_input(input)),
    }
}

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

// ---------------------------------------------------------------------------
// nodes
// ---------------------------------------------------------------------------

fn node_ref(input: &mut &str) -> winnow::Result<NodeRef> {
    let id = identifier.parse_next(input)?.to_string();
    let shape = opt(shape_label).parse_next(input)?;
    let classes = opt(class_marker).parse_next(input)?.unwrap_or_default();
    Ok(NodeRef { id, shape, classes })
}

fn class_marker(input: &mut &str) -> winnow::Result<Vec<String>> {
    ":::".parse_next(input)?;
    separated(1.., identifier.map(str::to_string), ',').parse_next(input)
}

fn shape_label(input: &mut &str) -> winnow::Result<(NodeShape, String)> {
    // Longest opener first within each bracket family.
    alt((
        bracketed(NodeShape::DoubleCircle),
        bracketed(NodeShape::Circle),
        bracketed(NodeShape::Stadium),
        bracketed(NodeShape::Ellipse),
        bracketed(NodeShape::Round),
        bracketed(NodeShape::Subroutine),
        bracketed(NodeShape::Cylinder),
        trapezoid_family,
        bracketed(NodeShape::Square),
        bracketed(NodeShape::Hexagon),
        bracketed(NodeShape::Diamond),
        bracketed(NodeShape::Odd),
    ))
    .parse_next(input)
}

fn bracketed(shape: NodeShape) -> impl FnMut(&mut &str) -> winnow::Result<(NodeShape, String)> {
    let (open, close) = shape.brackets();
    move |input: &mut &str| {
        literal(open).parse_next(input)?;
        let text = label_text(close).parse_next(input)?;
        literal(close).parse_next(input)?;
        Ok((shape, text))
    }
}

/// The four `[/ … \]` spellings share openers, so the closer decides the shape.
fn trapezoid_family(input: &mut &str) -> winnow::Result<(NodeShape, String)> {
    let open = alt(("[/", "[\\")).parse_next(input)?;
    let text = if input.starts_with('"') {
        quoted_label.parse_next(input)?
    } else {
        take_while(1.., |c: char| {
            c != '/' && c != '\\' && c != ']' && c != '\n'
        })
        .parse_next(input)?
        .trim()
        .to_string()
    };
    let close = alt(("/]", "\\]")).parse_next(input)?;
    let shape = match (open, close) {
        ("[/", "\\]") => NodeShape::Trapezoid,
        ("[\\", "/]") => NodeShape::InvTrapezoid,
        ("[/", "/]") => NodeShape::LeanRight,
        _ => NodeShape::LeanLeft,
    };
    Ok((shape, text))
}

fn label_text(close: &'static str) -> impl FnMut(&mut &str) -> winnow::Result<String> {
    let stop = close.chars().next().unwrap_or('\n');
    move |input: &mut &str| {
        if input.starts_with('"') {
            quoted_label.parse_next(input)
        } else {
            let text =
                take_while(1.., |c: char| c != stop && c != '\n').parse_next(input)?;
            Ok(text.trim().to_string())
        }
    }
}

/// `"…"` with `\"` and `\\` escapes; a newline inside is an unterminated label.
fn quoted_label(input: &mut &str) -> winnow::Result<String> {
    '"'.parse_next(input)?;
    let mut out = String::new();
    loop {
        let c: char = any.parse_next(input)?;
        match c {
            '"' => return Ok(out),
            '\\' => {
                let escaped: char = any.parse_next(input)?;
                match escaped {
                    '"' | '\\' => out.push(escaped),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            '\n' | '\r' => return Err(winnow::error::ParserError::from_input(input)),
            c => out.push(c),
        }
    }
}

// ---------------------------------------------------------------------------
// links
// ---------------------------------------------------------------------------

fn link_spec(input: &mut &str) -> winnow::Result<LinkSpec> {
    alt((spelled_link, compact_link)).parse_next(input)
}

/// `-->`, `o-.-o`, `====`, … : optional lead-in, stroke body, optional
/// lead-out, optional `|text|` label.
fn compact_link(input: &mut &str) -> winnow::Result<LinkSpec> {
    let lead_in =
        opt(terminated(one_of(['o', 'x']), peek(one_of(['-', '='])))).parse_next(input)?;
    let (stroke, body) = alt((dotted_body, thick_body, normal_body)).parse_next(input)?;
    let lead_out = opt(one_of(['>', 'o', 'x'])).parse_next(input)?;

    let arrow = match (lead_in, lead_out) {
        (_, Some('>')) => ArrowType::Point,
        (_, Some('o')) => ArrowType::Circle,
        (_, Some('x')) => ArrowType::Cross,
        (Some('o'), None) => ArrowType::Circle,
        (Some('x'), None) => ArrowType::Cross,
        _ => ArrowType::Open,
    };

    // Closed bodies carry length+1 stroke chars, open bodies length+2;
    // dotted length is the dot count.
    let length = match stroke {
        Stroke::Dotted => body,
        Stroke::Normal | Stroke::Thick => {
            if lead_out.is_some() || lead_in.is_some() {
                body - 1
            } else if body >= 3 {
                body - 2
            } else {
                return Err(winnow::error::ParserError::from_input(input));
            }
        }
    };

    let text = opt(pipe_label).parse_next(input)?;
    Ok(LinkSpec {
        arrow,
        stroke,
        length,
        text,
    })
}

fn dotted_body(input: &mut &str) -> winnow::Result<(Stroke, usize)> {
    ('-', take_while(1.., '.'), '-')
        .map(|(_, dots, _): (char, &str, char)| (Stroke::Dotted, dots.len()))
        .parse_next(input)
}

fn thick_body(input: &mut &str) -> winnow::Result<(Stroke, usize)> {
    take_while(2.., '=')
        .map(|s: &str| (Stroke::Thick, s.len()))
        .parse_next(input)
}

fn normal_body(input: &mut &str) -> winnow::Result<(Stroke, usize)> {
    take_while(2.., '-')
        .map(|s: &str| (Stroke::Normal, s.len()))
        .parse_next(input)
}

fn pipe_label(input: &mut &str) -> winnow::Result<String> {
    '|'.parse_next(input)?;
    space0.parse_next(input)?;
    let text = if input.starts_with('"') {
        let text = quoted_label.parse_next(input)?;
        space0.parse_next(input)?;
        text
    } else {
        take_while(1.., |c: char| c != '|' && c != '\n')
            .parse_next(input)?
            .trim()
            .to_string()
    };
    '|'.parse_next(input)?;
    Ok(text)
}

/// The spelled-out label forms: `A -- text --> B`, `A == text ==> B`,
/// `A -. text .-> B` and their arrowless variants.
fn spelled_link(input: &mut &str) -> winnow::Result<LinkSpec> {
    alt((
        spelled("-- ", " -->", ArrowType::Point, Stroke::Normal),
        spelled("-- ", " ---", ArrowType::Open, Stroke::Normal),
        spelled("== ", " ==>", ArrowType::Point, Stroke::Thick),
        spelled("== ", " ===", ArrowType::Open, Stroke::Thick),
        spelled("-. ", " .->", ArrowType::Point, Stroke::Dotted),
        spelled("-. ", " .-", ArrowType::Open, Stroke::Dotted),
    ))
    .parse_next(input)
}

fn spelled(
    open: &'static str,
    close: &'static str,
    arrow: ArrowType,
    stroke: Stroke,
) -> impl FnMut(&mut &str) -> winnow::Result<LinkSpec> {
    move |input: &mut &str| {
        literal(open).parse_next(input)?;
        let text = take_until(1.., close).parse_next(input)?;
        if text.contains('\n') {
            return Err(winnow::error::ParserError::from_input(input));
        }
        literal(close).parse_next(input)?;
        Ok(LinkSpec {
            arrow,
            stroke,
            length: 1,
            text: Some(text.trim().to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// statements
// ---------------------------------------------------------------------------

fn node_group(input: &mut &str) -> winnow::Result<Vec<NodeRef>> {
    separated(1.., node_ref, (space0, '&', space0)).parse_next(input)
}

fn chain_line(input: &mut &str) -> winnow::Result<ChainStmt> {
    let head = node_group.parse_next(input)?;
    let mut hops = Vec::new();
    loop {
        let spec = match opt(preceded(space0, link_spec)).parse_next(input)? {
            Some(spec) => spec,
            None => break,
        };
        space0.parse_next(input)?;
        let group = node_group.parse_next(input)?;
        hops.push((spec, group));
    }
    end_of_line.parse_next(input)?;
    Ok(ChainStmt { head, hops })
}

fn subgraph_block(input: &mut &str) -> winnow::Result<SubgraphBlock> {
    ("subgraph", space1).parse_next(input)?;
    let id = identifier.parse_next(input)?.to_string();
    let title = opt(bracket_title).parse_next(input)?;
    end_of_line.parse_next(input)?;

    let mut direction = None;
    let mut lines = Vec::new();
    loop {
        space0.parse_next(input)?;
        if opt(end_keyword).parse_next(input)?.is_some() {
            break;
        }
        // Unterminated block, or a nested subgraph (membership is flat).
        if input.is_empty() || input.starts_with("subgraph") {
            return Err(winnow::error::ParserError::from_input(input));
        }
        if opt(line_ending).parse_next(input)?.is_some() {
            continue;
        }
        if opt(comment_line).parse_next(input)?.is_some() {
            continue;
        }
        if let Some(dir) = opt(direction_line).parse_next(input)? {
            direction = Some(dir);
            continue;
        }
        lines.push(chain_line.parse_next(input)?);
    }
    Ok(SubgraphBlock {
        id,
        title,
        direction,
        lines,
    })
}

fn bracket_title(input: &mut &str) -> winnow::Result<String> {
    '['.parse_next(input)?;
    let text = label_text("]").parse_next(input)?;
    ']'.parse_next(input)?;
    Ok(text)
}

fn end_keyword(input: &mut &str) -> winnow::Result<()> {
    ("end", space0, alt((line_ending.void(), eof.void())))
        .void()
        .parse_next(input)
}

fn direction_line(input: &mut &str) -> winnow::Result<Direction> {
    ("direction", space1).parse_next(input)?;
    let direction = direction_token.parse_next(input)?;
    end_of_line.parse_next(input)?;
    Ok(direction)
}

fn class_def_line(input: &mut &str) -> winnow::Result<Line> {
    ("classDef", space1).parse_next(input)?;
    let name = identifier.parse_next(input)?.to_string();
    space1.parse_next(input)?;
    let styles = style_list.parse_next(input)?;
    end_of_line.parse_next(input)?;
    Ok(Line::ClassDef(ClassDef { name, styles }))
}

fn style_list(input: &mut &str) -> winnow::Result<Vec<(String, String)>> {
    separated(1.., style_pair, ',').parse_next(input)
}

fn style_pair(input: &mut &str) -> winnow::Result<(String, String)> {
    let prop = take_while(1.., |c: char| {
        c != ':' && c != ',' && c != '\n' && c != '\r'
    })
    .parse_next(input)?;
    ':'.parse_next(input)?;
    let value = take_while(1.., |c: char| c != ',' && c != '\n' && c != '\r')
        .parse_next(input)?;
    Ok((prop.trim().to_string(), value.trim().to_string()))
}

fn class_line(input: &mut &str) -> winnow::Result<Line> {
    ("class", space1).parse_next(input)?;
    let nodes: Vec<String> =
        separated(1.., identifier.map(str::to_string), ',').parse_next(input)?;
    space1.parse_next(input)?;
    let classes: Vec<String> =
        separated(1.., identifier.map(str::to_string), ',').parse_next(input)?;
    end_of_line.parse_next(input)?;
    Ok(Line::ClassAssign { nodes, classes })
}

fn click_line(input: &mut &str) -> winnow::Result<Line> {
    ("click", space1).parse_next(input)?;
    let node = identifier.parse_next(input)?.to_string();
    space1.parse_next(input)?;
    let action = alt((href_action, call_action)).parse_next(input)?;
    end_of_line.parse_next(input)?;
    Ok(Line::Click(Click { node, action }))
}

fn href_action(input: &mut &str) -> winnow::Result<ClickAction> {
    ("href", space1).parse_next(input)?;
    let url = quoted_label.parse_next(input)?;
    let target = opt(preceded(
        space1,
        take_while(1.., |c: char| !c.is_whitespace()).map(str::to_string),
    ))
    .parse_next(input)?;
    Ok(ClickAction::Href { url, target })
}

fn call_action(input: &mut &str) -> winnow::Result<ClickAction> {
    ("call", space1).parse_next(input)?;
    let name = identifier.parse_next(input)?.to_string();
    let args = opt((
        '(',
        take_while(0.., |c: char| c != ')' && c != '\n'),
        ')',
    )
        .map(|(_, args, _): (char, &str, char)| args.to_string()))
    .parse_next(input)?;
    Ok(ClickAction::Call { name, args })
}

fn link_style_line(input: &mut &str) -> winnow::Result<Line> {
    ("linkStyle", space1).parse_next(input)?;
    let index = alt((
        "default".value(LinkIndex::Default),
        digit1.parse_to::<usize>().map(LinkIndex::At),
    ))
    .parse_next(input)?;
    let interpolate = opt(preceded(
        space1,
        ("interpolate", space1, identifier).map(|(_, _, name)| name.to_string()),
    ))
    .parse_next(input)?;
    let styles = opt(preceded(space1, style_list))
        .parse_next(input)?
        .unwrap_or_default();
    end_of_line.parse_next(input)?;
    Ok(Line::LinkStyle(LinkStyle {
        index,
        styles,
        interpolate,
    }))
}

fn acc_descr_line(input: &mut &str) -> winnow::Result<Line> {
    ("accDescr", space0, ':', space0).parse_next(input)?;
    let text = rest_of_line.parse_next(input)?;
    Ok(Line::AccDescr(text))
}

// ---------------------------------------------------------------------------
// AST construction
// ---------------------------------------------------------------------------

fn apply_line(ast: &mut FlowchartAst, line: Line) {
    match line {
        Line::Chain(stmt) => {
            apply_chain(ast, &stmt);
        }
        Line::Subgraph(block) => {
            let index = ast.subgraphs.len();
            ast.subgraphs.push(Subgraph {
                id: block.id,
                title: block.title,
                direction: block.direction,
                nodes: Vec::new(),
            });
            let mut members = Vec::new();
            for stmt in &block.lines {
                for id in apply_chain(ast, stmt) {
                    // First membership wins; a node belongs to one subgraph.
                    if !members.contains(&id) && ast.subgraph_of(&id).is_none() {
                        members.push(id);
                    }
                }
            }
            ast.subgraphs[index].nodes = members;
        }
        Line::ClassDef(def) => match ast.class_defs.iter_mut().find(|d| d.name == def.name) {
            Some(existing) => *existing = def,
            None => ast.class_defs.push(def),
        },
        Line::ClassAssign { nodes, classes } => {
            for node in &nodes {
                ast.ensure_node(node);
                for class in &classes {
                    ast.add_class(node, class);
                }
            }
        }
        Line::Click(click) => {
            ast.ensure_node(&click.node);
            match ast.clicks.iter_mut().find(|c| c.node == click.node) {
                Some(existing) => *existing = click,
                None => ast.clicks.push(click),
            }
        }
        Line::LinkStyle(style) => ast.link_styles.push(style),
        Line::AccDescr(text) => ast.acc_description = Some(text),
    }
}

/// Register the statement's nodes and links; returns the referenced node ids
/// in order of first appearance (for subgraph membership).
fn apply_chain(ast: &mut FlowchartAst, stmt: &ChainStmt) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut register = |ast: &mut FlowchartAst, seen: &mut Vec<String>, group: &[NodeRef]| {
        for node_ref in group {
            register_node(ast, node_ref);
            if !seen.contains(&node_ref.id) {
                seen.push(node_ref.id.clone());
            }
        }
    };

    register(ast, &mut seen, &stmt.head);
    let mut sources: Vec<String> = stmt.head.iter().map(|r| r.id.clone()).collect();
    for (spec, group) in &stmt.hops {
        register(ast, &mut seen, group);
        let targets: Vec<String> = group.iter().map(|r| r.id.clone()).collect();
        for source in &sources {
            for target in &targets {
                ast.links.push(Link {
                    source: source.clone(),
                    target: target.clone(),
                    arrow: spec.arrow,
                    stroke: spec.stroke,
                    length: spec.length,
                    text: spec.text.clone(),
                });
            }
        }
        sources = targets;
    }
    seen
}

fn register_node(ast: &mut FlowchartAst, node_ref: &NodeRef) {
    match &node_ref.shape {
        Some((shape, label)) => ast.upsert_node(Node {
            id: node_ref.id.clone(),
            shape: *shape,
            text: Some(label.clone()),
        }),
        None => ast.ensure_node(&node_ref.id),
    }
    for class in &node_ref.classes {
        ast.add_class(&node_ref.id, class);
    }
}
