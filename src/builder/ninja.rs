//! Ninja build file writer.
//!
//! [`Writer`] emits the ninja syntax subset the generator needs; [`render`]
//! turns a [`BuildPlan`] into a complete `build.ninja`.

use std::collections::HashMap;

use crate::builder::plan::{BuildPlan, BuildStep, Stage};

/// Column ninja lines are wrapped at.
pub const DEFAULT_WIDTH: usize = 78;

/// Escape a path for use in a build statement.
pub fn escape_path(path: &str) -> String {
    path.replace("$ ", "$$ ")
        .replace(' ', "$ ")
        .replace(':', "$:")
}

/// Escape a literal value so ninja does not expand `$`.
pub fn escape(value: &str) -> String {
    value.replace('$', "$$")
}

/// Incremental writer for ninja syntax.
#[derive(Debug)]
pub struct Writer {
    out: String,
    width: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Writer::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Writer::with_width(DEFAULT_WIDTH)
    }

    pub fn with_width(width: usize) -> Self {
        Writer {
            out: String::new(),
            width,
        }
    }

    pub fn newline(&mut self) {
        self.out.push('\n');
    }

    pub fn comment(&mut self, text: &str) {
        let limit = self.width.saturating_sub(2);
        let mut line = String::new();

        for word in text.split_whitespace() {
            if !line.is_empty() && line.len() + 1 + word.len() > limit {
                self.out.push_str("# ");
                self.out.push_str(&line);
                self.out.push('\n');
                line.clear();
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }

        if !line.is_empty() {
            self.out.push_str("# ");
            self.out.push_str(&line);
            self.out.push('\n');
        }
    }

    pub fn variable(&mut self, key: &str, value: &str, indent: usize) {
        self.line(&format!("{} = {}", key, value), indent);
    }

    pub fn rule(&mut self, name: &str, command: &str, description: Option<&str>) {
        self.line(&format!("rule {}", name), 0);
        self.variable("command", command, 1);
        if let Some(description) = description {
            self.variable("description", description, 1);
        }
    }

    /// Write a build statement.
    ///
    /// `implicit` entries go after `|` and do not appear in `$in`.
    pub fn build<'a>(
        &mut self,
        outputs: &[&str],
        rule: &str,
        inputs: &[&str],
        implicit: &[&str],
        pool: Option<&str>,
        variables: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let outputs: Vec<String> = outputs.iter().map(|o| escape_path(o)).collect();

        let mut all_inputs: Vec<String> = inputs.iter().map(|i| escape_path(i)).collect();
        if !implicit.is_empty() {
            all_inputs.push("|".to_string());
            all_inputs.extend(implicit.iter().map(|i| escape_path(i)));
        }

        let mut line = format!("build {}: {}", outputs.join(" "), rule);
        for input in &all_inputs {
            line.push(' ');
            line.push_str(input);
        }
        self.line(&line, 0);

        if let Some(pool) = pool {
            self.variable("pool", pool, 1);
        }
        for (key, value) in variables {
            self.variable(key, value, 1);
        }
    }

    pub fn default(&mut self, paths: &[&str]) {
        self.line(&format!("default {}", paths.join(" ")), 0);
    }

    pub fn finish(self) -> String {
        self.out
    }

    /// Write `text`, wrapping at spaces with ` $` continuations.
    ///
    /// A space preceded by an odd run of `$` is an escaped space and is never
    /// a break point. Words longer than the width are left intact.
    fn line(&mut self, text: &str, indent: usize) {
        let mut leading = "  ".repeat(indent);
        let mut text = text;

        while leading.len() + text.len() > self.width {
            let available = self.width.saturating_sub(leading.len() + 2);
            let bytes = text.as_bytes();

            let split = rfind_break(bytes, available).or_else(|| find_break(bytes, available));
            let Some(at) = split else {
                break;
            };

            self.out.push_str(&leading);
            self.out.push_str(&text[..at]);
            self.out.push_str(" $\n");

            text = &text[at + 1..];
            leading = "  ".repeat(indent + 2);
        }

        self.out.push_str(&leading);
        self.out.push_str(text);
        self.out.push('\n');
    }
}

fn dollars_before(bytes: &[u8], index: usize) -> usize {
    bytes[..index].iter().rev().take_while(|&&b| b == b'$').count()
}

/// Last unescaped space before `end`.
fn rfind_break(bytes: &[u8], end: usize) -> Option<usize> {
    let mut end = end.min(bytes.len());
    loop {
        let pos = bytes[..end].iter().rposition(|&b| b == b' ')?;
        if dollars_before(bytes, pos) % 2 == 0 {
            return Some(pos);
        }
        end = pos;
    }
}

/// First unescaped space at or after `start`.
fn find_break(bytes: &[u8], start: usize) -> Option<usize> {
    let mut from = start;
    loop {
        let pos = from + bytes.get(from..)?.iter().position(|&b| b == b' ')?;
        if dollars_before(bytes, pos) % 2 == 0 {
            return Some(pos);
        }
        from = pos + 1;
    }
}

/// Render a complete `build.ninja` for `plan`.
pub fn render(plan: &BuildPlan) -> String {
    let mut w = Writer::new();

    w.comment(&format!(
        "this file is generated by buildchain for {} ({})",
        plan.target, plan.libc
    ));
    w.newline();

    for group in &plan.variables {
        if let Some(comment) = &group.comment {
            w.comment(comment);
            w.newline();
        }
        for var in &group.variables {
            w.variable(&var.name, &var.value, 0);
        }
        w.newline();
    }

    for rule in &plan.rules {
        w.rule(&rule.name, &rule.command, Some(&rule.description));
        w.newline();
    }

    let outputs: HashMap<&str, &str> = plan
        .steps
        .iter()
        .map(|s| (s.name.as_str(), s.output.as_str()))
        .collect();

    let mut stage: Option<Stage> = None;
    let mut stage_no = 0;

    for step in &plan.steps {
        if stage != Some(step.stage) {
            let heading = match step.stage {
                Stage::Clean | Stage::Install => step.stage.description().to_string(),
                other => {
                    stage_no += 1;
                    format!("step {} - {}", stage_no, other.description())
                }
            };
            w.comment(&heading);
            w.newline();
            stage = Some(step.stage);
        }

        write_step(&mut w, step, &outputs);
        w.newline();
    }

    if !plan.defaults.is_empty() {
        let defaults: Vec<&str> = plan
            .defaults
            .iter()
            .filter_map(|name| outputs.get(name.as_str()).copied())
            .collect();

        w.comment("default targets");
        w.newline();
        w.default(&defaults);
    }

    w.finish()
}

fn write_step(w: &mut Writer, step: &BuildStep, outputs: &HashMap<&str, &str>) {
    let inputs: Vec<&str> = step.inputs.iter().map(String::as_str).collect();

    let implicit: Vec<&str> = step
        .deps
        .iter()
        .filter_map(|dep| outputs.get(dep.as_str()).copied())
        .filter(|out| !inputs.contains(out))
        .collect();

    w.build(
        &[step.output.as_str()],
        &step.rule,
        &inputs,
        &implicit,
        step.pool.as_deref(),
        step.bindings
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );
}
