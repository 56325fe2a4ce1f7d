#![allow(dead_code)]

use regex::Regex;
use std::path::Path;
use std::sync::{LazyLock, Mutex};
use thesis_assembler::types::NumberingPolicy;
use thesis_assembler::{CompileJob, CompilerBackend, RenderBackend, RenderJob, Result, ThesisBuildError};

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
static IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.+?)\*").unwrap());

/// Heading element the way the compiler numbers it.
pub fn numbered_heading(level: usize, number: &str, id: &str, title: &str) -> String {
    format!(
        "<h{l} data-number=\"{n}\" id=\"{id}\"><span class=\"header-section-number\">{n}</span> {t}</h{l}>",
        l = level,
        n = number,
        id = id,
        t = title
    )
}

pub fn slug(title: &str) -> String {
    title
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn inline(text: &str) -> String {
    let text = IMAGE.replace_all(text, r#"<img src="$2" alt="$1" />"#);
    let text = BOLD.replace_all(&text, "<strong>$1</strong>");
    EMPHASIS.replace_all(&text, "<em>$1</em>").into_owned()
}

/// Minimal markdown-to-HTML conversion shaped like the real compiler's
/// standalone HTML5 output.
pub fn compile_markdown(markdown: &str, numbering: NumberingPolicy) -> String {
    let numbered = numbering == NumberingPolicy::Numbered;
    let mut counters = [0usize; 6];
    let mut toc = String::new();
    let mut body = String::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut in_table = false;

    fn flush(body: &mut String, paragraph: &mut Vec<&str>, in_table: &mut bool) {
        if !paragraph.is_empty() {
            body.push_str(&format!("<p>{}</p>\n", inline(&paragraph.join("\n"))));
            paragraph.clear();
        }
        if *in_table {
            body.push_str("<table><tbody></tbody></table>\n");
            *in_table = false;
        }
    }

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut body, &mut paragraph, &mut in_table);
        } else if let Some(caps) = HEADING.captures(trimmed) {
            flush(&mut body, &mut paragraph, &mut in_table);
            let level = caps[1].len();
            let title = caps[2].trim().to_string();
            let id = slug(&title);
            if numbered {
                counters[level - 1] += 1;
                for deeper in counters.iter_mut().skip(level) {
                    *deeper = 0;
                }
                let number = counters[..level]
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(".");
                body.push_str(&numbered_heading(level, &number, &id, &title));
                body.push('\n');
                if level <= 2 {
                    toc.push_str(&format!(
                        "<li><a href=\"#{id}\" id=\"toc-{id}\"><span class=\"toc-section-number\">{n}</span> {t}</a></li>\n",
                        id = id,
                        n = number,
                        t = title
                    ));
                }
            } else {
                body.push_str(&format!("<h{l} id=\"{id}\">{t}</h{l}>\n", l = level, id = id, t = title));
            }
        } else if trimmed.starts_with('|') {
            if !paragraph.is_empty() {
                let pending = std::mem::take(&mut paragraph);
                body.push_str(&format!("<p>{}</p>\n", inline(&pending.join("\n"))));
            }
            in_table = true;
        } else if trimmed.starts_with('<') && trimmed.ends_with('>') {
            flush(&mut body, &mut paragraph, &mut in_table);
            body.push_str(trimmed);
            body.push('\n');
        } else {
            paragraph.push(line);
        }
    }
    flush(&mut body, &mut paragraph, &mut in_table);

    let nav = if numbered {
        format!("<nav id=\"TOC\" role=\"doc-toc\">\n<ul>\n{}</ul>\n</nav>\n", toc)
    } else {
        String::new()
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>Tesina</title>\n</head>\n<body>\n{}{}</body>\n</html>\n",
        nav, body
    )
}

pub struct FakeCompiler {
    pub fail_cover: bool,
    pub fail_main: bool,
    pub jobs: Mutex<Vec<CompileJob>>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self {
            fail_cover: false,
            fail_main: false,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_cover() -> Self {
        Self {
            fail_cover: true,
            ..Self::new()
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

impl CompilerBackend for FakeCompiler {
    fn name(&self) -> &str {
        "fake-pandoc"
    }

    async fn compile(&self, job: &CompileJob) -> Result<()> {
        self.jobs.lock().unwrap().push(job.clone());
        let fail = match job.numbering {
            NumberingPolicy::Unnumbered => self.fail_cover,
            NumberingPolicy::Numbered => self.fail_main,
        };
        if fail {
            return Err(ThesisBuildError::ToolFailed {
                tool: "fake-pandoc".to_string(),
                status: "exit status: 64".to_string(),
                stderr: "cannot parse input".to_string(),
            });
        }
        let markdown = tokio::fs::read_to_string(&job.input).await?;
        tokio::fs::write(&job.output, compile_markdown(&markdown, job.numbering)).await?;
        Ok(())
    }
}

pub struct FakeRenderer {
    pub fail: bool,
    pub calls: Mutex<usize>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl RenderBackend for FakeRenderer {
    fn name(&self) -> &str {
        "fake-weasyprint"
    }

    async fn render(&self, job: &RenderJob) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(ThesisBuildError::ToolFailed {
                tool: "fake-weasyprint".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Traceback: layout failed".to_string(),
            });
        }
        tokio::fs::write(&job.pdf, b"%PDF-1.7\n").await?;
        Ok(())
    }
}

pub fn write(base: &Path, relative: &str, text: &str) {
    let path = base.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, text).unwrap();
}
