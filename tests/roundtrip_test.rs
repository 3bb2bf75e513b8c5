//! Round-trip guarantees: everything the renderer emits re-parses to an
//! equivalent graph, and rendering is idempotent, across the whole option
//! grid.

use mflow::{Flowchart, FlowchartAst, Indent, RenderOptions};
use pretty_assertions::assert_eq;

const CORPUS: &[&str] = &[
    "flowchart LR\n    A[Start] --> B(Running) --> C{Done?}\n    C -->|yes| D[End]\n    C -->|no| B\n",
    "flowchart TD\n    A --- B\n    B ==>|heavy| C\n    C -.->|\"maybe\"| D\n    D --o E\n    E --x F\n    F o--o G\n    G x--x H\n    A ----> H\n",
    "flowchart RL\n    in1 & in2 --> mid --> out1 & out2\n    mid --> mid\n",
    "flowchart TB\n    subgraph front[\"Front end\"]\n        direction LR\n        ui --> state\n    end\n    subgraph back\n        api --> db[(store)]\n    end\n    state --> api\n",
    "flowchart LR\n    A --> B\n    classDef hot fill:#f96,stroke:#333\n    classDef cold fill:#69f\n    class A hot\n    class B hot,cold\n    click A href \"https://example.com\" _blank\n    click B call toggle(\"x\")\n    linkStyle default stroke:gray\n    linkStyle 0 interpolate basis stroke:red,stroke-width:2px\n",
    "---\ntitle: Release train\n---\nflowchart BT\n    accDescr: how releases flow\n    plan --> build --> ship\n",
    "flowchart LR\n    a[\"square\"] --> b(\"round\") --> c((\"circle\"))\n    d(((\"double\"))) --> e(-\"ellipse\"-) --> f([\"stadium\"])\n    g[[\"subroutine\"]] --> h[(\"cylinder\")] --> i{\"diamond\"}\n    j{{\"hexagon\"}} --> k>\"odd\"] --> l[/\"lean right\"/]\n    m[\\\"lean left\"\\] --> n[/\"trapezoid\"\\] --> o[\\\"inv trapezoid\"/]\n",
    "flowchart TD\n    lonely\n    another[\"with text\"]:::hot\n    start --> loop --> loop\n    classDef hot fill:#f96\n",
];

fn option_grid() -> Vec<RenderOptions> {
    let indents = [
        Indent::Spaces(0),
        Indent::Spaces(2),
        Indent::Spaces(4),
        Indent::Spaces(8),
        Indent::Tab,
    ];
    let mut grid = Vec::new();
    for indent in indents {
        for sort_nodes in [false, true] {
            for inline_classes in [false, true] {
                for compact_links in [false, true] {
                    grid.push(RenderOptions {
                        indent,
                        sort_nodes,
                        inline_classes,
                        compact_links,
                    });
                }
            }
        }
    }
    grid
}

/// Order-independent view of everything the source text pins down. Node order
/// and link order are presentation choices, and link length is cosmetic, so
/// none of those participate.
#[derive(Debug, PartialEq)]
struct Summary {
    direction: &'static str,
    nodes: Vec<(String, String, String)>,
    links: Vec<(String, String, String, String, Option<String>)>,
    subgraphs: Vec<(String, Option<String>, Option<&'static str>, Vec<String>)>,
    class_defs: Vec<(String, Vec<(String, String)>)>,
    classes: Vec<(String, Vec<String>)>,
    clicks: Vec<(String, String)>,
    link_styles: Vec<String>,
    title: Option<String>,
    acc_description: Option<String>,
}

fn summarize(ast: &FlowchartAst) -> Summary {
    let mut nodes: Vec<(String, String, String)> = ast
        .nodes
        .iter()
        .map(|n| (n.id.clone(), format!("{:?}", n.shape), n.label().to_string()))
        .collect();
    nodes.sort();

    let mut links: Vec<(String, String, String, String, Option<String>)> = ast
        .links
        .iter()
        .map(|l| {
            (
                l.source.clone(),
                l.target.clone(),
                format!("{:?}", l.arrow),
                format!("{:?}", l.stroke),
                l.text.clone(),
            )
        })
        .collect();
    links.sort();

    let mut subgraphs: Vec<(String, Option<String>, Option<&'static str>, Vec<String>)> = ast
        .subgraphs
        .iter()
        .map(|sg| {
            let mut members = sg.nodes.clone();
            members.sort();
            (
                sg.id.clone(),
                sg.title.clone(),
                sg.direction.map(|d| d.as_str()),
                members,
            )
        })
        .collect();
    subgraphs.sort();

    let mut class_defs: Vec<(String, Vec<(String, String)>)> = ast
        .class_defs
        .iter()
        .map(|def| (def.name.clone(), def.styles.clone()))
        .collect();
    class_defs.sort();

    let mut classes = ast.classes.clone();
    classes.sort();

    let mut clicks: Vec<(String, String)> = ast
        .clicks
        .iter()
        .map(|c| (c.node.clone(), format!("{:?}", c.action)))
        .collect();
    clicks.sort();

    let mut link_styles: Vec<String> =
        ast.link_styles.iter().map(|s| format!("{s:?}")).collect();
    link_styles.sort();

    Summary {
        direction: ast.direction.as_str(),
        nodes,
        links,
        subgraphs,
        class_defs,
        classes,
        clicks,
        link_styles,
        title: ast.title.clone(),
        acc_description: ast.acc_description.clone(),
    }
}

#[test]
fn render_then_parse_is_equivalent_across_the_option_grid() {
    for input in CORPUS {
        let original = Flowchart::parse(input).unwrap();
        let expected = summarize(original.ast());
        for options in option_grid() {
            let output = original.render(&options).unwrap();
            let reparsed = Flowchart::parse(&output)
                .unwrap_or_else(|e| panic!("output failed to parse: {e}\n{output}"));
            assert_eq!(
                summarize(reparsed.ast()),
                expected,
                "options {options:?} broke equivalence for:\n{output}"
            );
        }
    }
}

#[test]
fn rendering_is_idempotent_across_the_option_grid() {
    for input in CORPUS {
        for options in option_grid() {
            let once = mflow::normalize(input, &options).unwrap();
            let twice = mflow::normalize(&once, &options).unwrap();
            assert_eq!(once, twice, "options {options:?} not idempotent for:\n{input}");
        }
    }
}

#[test]
fn compaction_preserves_the_link_multiset() {
    let options = RenderOptions {
        compact_links: true,
        ..RenderOptions::default()
    };
    for input in CORPUS {
        let original = Flowchart::parse(input).unwrap();
        let output = original.render(&options).unwrap();
        let reparsed = Flowchart::parse(&output).unwrap();
        assert_eq!(
            summarize(reparsed.ast()).links,
            summarize(original.ast()).links,
            "for:\n{output}"
        );
    }
}

#[test]
fn compacted_output_has_no_more_lines_than_plain_output() {
    for input in CORPUS {
        let plain = mflow::normalize(input, &RenderOptions::default()).unwrap();
        let compact = mflow::normalize(
            input,
            &RenderOptions {
                compact_links: true,
                ..RenderOptions::default()
            },
        )
        .unwrap();
        assert!(
            compact.lines().count() <= plain.lines().count(),
            "compact output grew:\n{compact}"
        );
    }
}
