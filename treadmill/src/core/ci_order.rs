//! CI task-order rewrite for treadmill snapshots.
//!
//! The CI file is read into a small model: top-level `<name>_task:` blocks
//! and the `depends_on:` list of each. The rewrite then moves the
//! dependency's integration test task right behind static validation:
//!
//! - the integration task depends on the validation task only;
//! - every other task (except the terminal aggregate) that depended on the
//!   validation task depends on the integration task instead.
//!
//! Only dependency list items are re-rendered; every other line is emitted
//! verbatim. Applying the rewrite to its own output changes nothing.

use std::sync::LazyLock;

use regex::Regex;

static TASK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)_task:(\s+&\S+)?\s*$").expect("task header regex")
});
static DEPENDS_ON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s+)depends_on:\s*$").expect("depends_on regex"));
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)-\s+([A-Za-z0-9_.\-]+)\s*(#.*)?$").expect("list item regex")
});

/// Task names driving the rewrite (without the `_task` suffix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOrder {
    pub validate: String,
    pub integration: String,
    pub terminal: String,
}

/// A task and its declared dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiTask {
    pub name: String,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone)]
struct DependencyList {
    /// Line index of the first list item.
    first: usize,
    /// One past the last list item.
    end: usize,
    item_indent: String,
    items: Vec<DependencyItem>,
}

#[derive(Debug, Clone)]
struct DependencyItem {
    name: String,
    raw: String,
}

#[derive(Debug, Clone)]
struct TaskBlock {
    name: String,
    depends: Option<DependencyList>,
}

#[derive(Debug, Clone)]
struct CiFile {
    lines: Vec<String>,
    trailing_newline: bool,
    tasks: Vec<TaskBlock>,
}

impl CiFile {
    fn parse(contents: &str) -> Self {
        let lines: Vec<String> = contents.lines().map(str::to_string).collect();
        let mut tasks: Vec<TaskBlock> = Vec::new();
        let mut idx = 0;
        while idx < lines.len() {
            let line = &lines[idx];
            if let Some(caps) = TASK_HEADER.captures(line) {
                tasks.push(TaskBlock {
                    name: caps[1].to_string(),
                    depends: None,
                });
                idx += 1;
                continue;
            }
            if starts_top_level_block(line) {
                // Non-task top-level key: anything below is not a task body.
                tasks.push(TaskBlock {
                    name: String::new(),
                    depends: None,
                });
                idx += 1;
                continue;
            }
            let Some(key) = DEPENDS_ON.captures(line) else {
                idx += 1;
                continue;
            };
            let key_indent = key[1].len();
            let first = idx + 1;
            let mut end = first;
            let mut items = Vec::new();
            let mut item_indent = String::new();
            while end < lines.len() {
                let Some(item) = LIST_ITEM.captures(&lines[end]) else {
                    break;
                };
                if item[1].len() < key_indent {
                    break;
                }
                if items.is_empty() {
                    item_indent = item[1].to_string();
                }
                items.push(DependencyItem {
                    name: item[2].to_string(),
                    raw: lines[end].clone(),
                });
                end += 1;
            }
            if let Some(task) = tasks.last_mut()
                && !task.name.is_empty()
                && task.depends.is_none()
                && !items.is_empty()
            {
                task.depends = Some(DependencyList {
                    first,
                    end,
                    item_indent,
                    items,
                });
            }
            idx = end.max(idx + 1);
        }
        tasks.retain(|task| !task.name.is_empty());
        Self {
            lines,
            trailing_newline: contents.ends_with('\n'),
            tasks,
        }
    }

    fn tasks(&self) -> Vec<CiTask> {
        self.tasks
            .iter()
            .map(|task| CiTask {
                name: task.name.clone(),
                depends_on: task
                    .depends
                    .as_ref()
                    .map(|list| list.items.iter().map(|i| i.name.clone()).collect())
                    .unwrap_or_default(),
            })
            .collect()
    }

    fn reorder(&mut self, order: &TaskOrder) {
        for task in &mut self.tasks {
            let Some(list) = task.depends.as_mut() else {
                continue;
            };
            if task.name == order.integration {
                let already = list.items.len() == 1 && list.items[0].name == order.validate;
                if !already {
                    list.items = vec![fresh_item(&list.item_indent, &order.validate)];
                }
                continue;
            }
            if task.name == order.terminal {
                continue;
            }
            if !list.items.iter().any(|i| i.name == order.validate) {
                continue;
            }
            let mut rewritten: Vec<DependencyItem> = Vec::new();
            for item in &list.items {
                let item = if item.name == order.validate {
                    fresh_item(&list.item_indent, &order.integration)
                } else {
                    item.clone()
                };
                if !rewritten.iter().any(|seen| seen.name == item.name) {
                    rewritten.push(item);
                }
            }
            list.items = rewritten;
        }
    }

    fn render(&self) -> String {
        let mut spans: Vec<&DependencyList> =
            self.tasks.iter().filter_map(|t| t.depends.as_ref()).collect();
        spans.sort_by_key(|list| list.first);

        let mut out: Vec<&str> = Vec::with_capacity(self.lines.len());
        let mut idx = 0;
        for list in spans {
            out.extend(self.lines[idx..list.first].iter().map(String::as_str));
            out.extend(list.items.iter().map(|i| i.raw.as_str()));
            idx = list.end;
        }
        out.extend(self.lines[idx..].iter().map(String::as_str));

        let mut rendered = out.join("\n");
        if self.trailing_newline {
            rendered.push('\n');
        }
        rendered
    }
}

fn starts_top_level_block(line: &str) -> bool {
    let Some(first) = line.chars().next() else {
        return false;
    };
    !first.is_whitespace() && first != '#' && !line.starts_with("---")
}

fn fresh_item(indent: &str, name: &str) -> DependencyItem {
    DependencyItem {
        name: name.to_string(),
        raw: format!("{indent}- {name}"),
    }
}

/// Tasks and their dependencies, in file order.
pub fn parse_tasks(contents: &str) -> Vec<CiTask> {
    CiFile::parse(contents).tasks()
}

/// Apply the fail-fast ordering to CI file `contents`.
pub fn rewrite_task_order(contents: &str, order: &TaskOrder) -> String {
    let mut file = CiFile::parse(contents);
    file.reorder(order);
    file.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIRRUS: &str = "---
env:
    FOO: bar

validate_task:
    name: Validate
    script: make validate

build_task:
    name: Build
    depends_on:
        - validate
    script: make

unit_test_task:
    depends_on:
        - validate
        - build   # needs binaries
    script: make test

buildah_bud_test_task:
    name: Buildah bud
    depends_on:
      - build
      - unit_test
    script: run-bud

success_task:
    depends_on:
        - validate
        - build
        - unit_test
        - buildah_bud_test
    script: true
";

    fn order() -> TaskOrder {
        TaskOrder {
            validate: "validate".to_string(),
            integration: "buildah_bud_test".to_string(),
            terminal: "success".to_string(),
        }
    }

    fn deps_of(contents: &str, name: &str) -> Vec<String> {
        parse_tasks(contents)
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.depends_on)
            .unwrap_or_default()
    }

    #[test]
    fn parses_tasks_and_dependencies() {
        let tasks = parse_tasks(CIRRUS);
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["validate", "build", "unit_test", "buildah_bud_test", "success"]
        );
        assert_eq!(deps_of(CIRRUS, "unit_test"), vec!["validate", "build"]);
        assert!(deps_of(CIRRUS, "validate").is_empty());
    }

    #[test]
    fn integration_task_runs_right_after_validate() {
        let out = rewrite_task_order(CIRRUS, &order());
        assert_eq!(deps_of(&out, "buildah_bud_test"), vec!["validate"]);
        assert_eq!(deps_of(&out, "build"), vec!["buildah_bud_test"]);
        assert_eq!(deps_of(&out, "unit_test"), vec!["buildah_bud_test", "build"]);
        assert_eq!(
            deps_of(&out, "success"),
            vec!["validate", "build", "unit_test", "buildah_bud_test"]
        );
        assert!(out.contains("      - validate\n    script: run-bud"));
        assert!(out.contains("        - build   # needs binaries"));
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite_task_order(CIRRUS, &order());
        let twice = rewrite_task_order(&once, &order());
        assert_eq!(once, twice);
    }

    #[test]
    fn non_dependency_lines_are_untouched() {
        let out = rewrite_task_order(CIRRUS, &order());
        let before: Vec<&str> = CIRRUS.lines().filter(|l| !l.trim_start().starts_with('-')).collect();
        let after: Vec<&str> = out.lines().filter(|l| !l.trim_start().starts_with('-')).collect();
        assert_eq!(before, after);
        assert!(out.ends_with("script: true\n"));
    }

    #[test]
    fn depends_on_outside_a_task_is_ignored() {
        let contents = "matrix:\n    depends_on:\n        - validate\n";
        assert_eq!(rewrite_task_order(contents, &order()), contents);
    }

    #[test]
    fn file_without_integration_task_only_retargets_dependents() {
        let contents = "validate_task:\n  script: x\n\nlint_task:\n  depends_on:\n    - validate\n";
        let out = rewrite_task_order(contents, &order());
        assert_eq!(deps_of(&out, "lint"), vec!["buildah_bud_test"]);
    }
}
