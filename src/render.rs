//! ASCII rendering of the stored unit hierarchy.

use crate::models::{Unit, UnitTreeNode};

/// One line per unit: type, sibling index when known, and id.
fn label(unit: &Unit) -> String {
    match unit.index {
        Some(index) => format!("{} #{} {}", unit.unit_type, index, unit.id),
        None => format!("{} {}", unit.unit_type, unit.id),
    }
}

/// Render stored units as a tree.
///
/// ```text
/// interlinear-text #1 t1
/// └── paragraph #1 p1
///     ├── phrase #1 s1
///     └── phrase #2 s2
/// ```
pub fn render_tree(roots: &[UnitTreeNode]) -> String {
    let mut output = String::new();
    for root in roots {
        output.push_str(&label(&root.unit));
        output.push('\n');
        render_children(&mut output, &root.children, "");
    }
    output
}

fn render_children(output: &mut String, children: &[UnitTreeNode], prefix: &str) {
    for (i, child) in children.iter().enumerate() {
        let is_last = i + 1 == children.len();
        let (branch, continuation) = if is_last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };

        output.push_str(prefix);
        output.push_str(branch);
        output.push_str(&label(&child.unit));
        output.push('\n');

        render_children(output, &child.children, &format!("{prefix}{continuation}"));
    }
}
