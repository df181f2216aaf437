use crate::client::Client;
use crate::dao::Dao;
use crate::model::{Database, Record};
use crate::storage::Bucket;
use crate::util::BoxResult;
use pulldown_cmark::escape::escape_html;
use pulldown_cmark::{html, Event, HeadingLevel, Options, Parser, Tag};
use serde::Deserialize;
use serde_json::{Map, Value};
use simple_error::bail;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const HTML: &str = "text/html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    Markdown,
    Notebook,
}

impl DocType {
    pub fn from_path(path: &str) -> Option<DocType> {
        let ext = path.rsplit('/').next()?.rsplit_once('.')?.1;
        match ext.to_ascii_lowercase().as_str() {
            "md" => Some(DocType::Markdown),
            "ipynb" => Some(DocType::Notebook),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Markdown => "md",
            DocType::Notebook => "ipynb",
        }
    }

    pub fn render(&self, src: &str) -> BoxResult<String> {
        match self {
            DocType::Markdown => Ok(render_markdown(src)),
            DocType::Notebook => render_notebook(src),
        }
    }
}

fn normalize(path: &str) -> String {
    let p = path.replace('\\', "/");
    let mut p = p.as_str();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p.trim_start_matches('/').to_string()
}

fn without_extension(path: &str) -> String {
    let p = normalize(path);
    let name_start = p.rfind('/').map_or(0, |i| i + 1);
    match p[name_start..].rfind('.') {
        Some(dot) if dot > 0 => p[..name_start + dot].to_string(),
        _ => p,
    }
}

/// `episodes/2019/foo.md` -> `/episodes/2019/foo`
pub fn content_key(path: &str) -> String {
    format!("/{}", without_extension(path))
}

/// `episodes/2019/foo.md` -> `blog/episodes/2019/foo.htm`
pub fn rendered_key(prefix: &str, path: &str) -> String {
    format!("{}{}.htm", prefix, without_extension(path))
}

pub fn render_markdown(src: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    let mut out = String::new();
    html::push_html(&mut out, Parser::new_ext(src, opts));
    out
}

/// Text of the first non-empty level-one heading.
pub fn find_title(markdown: &str) -> Option<String> {
    let mut in_title = false;
    let mut title = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading(HeadingLevel::H1, _, _)) => {
                in_title = true;
                title.clear();
            }
            Event::End(Tag::Heading(HeadingLevel::H1, _, _)) => {
                let t = title.trim();
                if !t.is_empty() {
                    return Some(t.to_string());
                }
                in_title = false;
            }
            Event::Text(t) | Event::Code(t) if in_title => title.push_str(&t),
            _ => {}
        }
    }
    None
}

#[derive(Deserialize)]
struct Notebook {
    cells: Vec<Cell>,
    #[serde(default)]
    metadata: NotebookMeta,
}

#[derive(Deserialize, Default)]
struct NotebookMeta {
    language_info: Option<LanguageInfo>,
    kernelspec: Option<KernelSpec>,
}

#[derive(Deserialize)]
struct LanguageInfo {
    name: Option<String>,
}

#[derive(Deserialize)]
struct KernelSpec {
    language: Option<String>,
}

#[derive(Deserialize)]
struct Cell {
    cell_type: String,
    #[serde(default)]
    source: Text,
    #[serde(default)]
    outputs: Vec<Output>,
}

#[derive(Deserialize)]
struct Output {
    output_type: String,
    text: Option<Text>,
    data: Option<Map<String, Value>>,
}

/// Notebook text is either one string or a list of lines.
#[derive(Deserialize)]
#[serde(untagged)]
enum Text {
    Lines(Vec<String>),
    Single(String),
}

impl Default for Text {
    fn default() -> Self {
        Text::Single(String::new())
    }
}

impl Text {
    fn joined(&self) -> String {
        match self {
            Text::Lines(lines) => lines.concat(),
            Text::Single(s) => s.clone(),
        }
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Array(lines) => lines.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

fn push_output_text(out: &mut String, text: &str) -> BoxResult<()> {
    out.push_str("<pre class=\"output\">");
    escape_html(&mut *out, text)?;
    out.push_str("</pre>\n");
    Ok(())
}

fn render_output(out: &mut String, output: &Output) -> BoxResult<()> {
    if output.output_type == "stream" {
        if let Some(text) = &output.text {
            push_output_text(out, &text.joined())?;
        }
        return Ok(());
    }
    let data = match &output.data {
        Some(d) => d,
        None => return Ok(()),
    };
    if let Some(png) = data.get("image/png") {
        let b64 = value_text(png).replace('\n', "");
        out.push_str(&format!("<img src=\"data:image/png;base64,{}\"/>\n", b64));
    } else if let Some(h) = data.get("text/html") {
        out.push_str(&value_text(h));
        out.push('\n');
    } else if let Some(t) = data.get("text/plain") {
        push_output_text(out, &value_text(t))?;
    }
    Ok(())
}

pub fn render_notebook(src: &str) -> BoxResult<String> {
    let nb: Notebook = serde_json::from_str(src)?;
    let lang = nb
        .metadata
        .language_info
        .and_then(|l| l.name)
        .or_else(|| nb.metadata.kernelspec.and_then(|k| k.language))
        .unwrap_or_else(|| "python".to_string());
    let mut out = String::new();
    for cell in &nb.cells {
        let source = cell.source.joined();
        match cell.cell_type.as_str() {
            "markdown" => out.push_str(&render_markdown(&source)),
            "code" => {
                out.push_str("<pre><code class=\"language-");
                escape_html(&mut out, &lang)?;
                out.push_str("\">");
                escape_html(&mut out, &source)?;
                out.push_str("</code></pre>\n");
                for output in &cell.outputs {
                    render_output(&mut out, output)?;
                }
            }
            _ => log::debug!("skipping {} cell", cell.cell_type),
        }
    }
    Ok(out)
}

fn notebook_title(src: &str) -> Option<String> {
    let nb: Notebook = serde_json::from_str(src).ok()?;
    nb.cells
        .iter()
        .filter(|c| c.cell_type == "markdown")
        .find_map(|c| find_title(&c.source.joined()))
}

/// Where post sources are read from.
pub trait ContentSource {
    fn read(&self, path: &str) -> BoxResult<String>;
    /// Human readable location, stored on the record.
    fn locate(&self, path: &str) -> String;
}

pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalSource { root: root.into() }
    }
}

impl ContentSource for LocalSource {
    fn read(&self, path: &str) -> BoxResult<String> {
        Ok(std::fs::read_to_string(self.root.join(normalize(path)))?)
    }

    fn locate(&self, path: &str) -> String {
        self.root.join(normalize(path)).display().to_string()
    }
}

/// Raw files of a GitHub repository branch.
pub struct GithubSource {
    client: Client,
    repo: String,
    branch: String,
}

impl GithubSource {
    pub fn new(repo: &str, branch: &str) -> Self {
        GithubSource {
            client: Client::default(),
            repo: repo.trim_matches('/').to_string(),
            branch: branch.trim_matches('/').to_string(),
        }
    }
}

impl ContentSource for GithubSource {
    fn read(&self, path: &str) -> BoxResult<String> {
        self.client.get_text(&self.locate(path))
    }

    fn locate(&self, path: &str) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/{}",
            self.repo,
            self.branch,
            normalize(path)
        )
    }
}

const POST_DEPTH: usize = 3;


/// Markdown and notebook files exactly two directories below `root`
/// (`<section>/<year>/<post>`), as sorted `/`-separated relative paths.
pub fn list_content(root: &Path) -> BoxResult<Vec<String>> {
    let mut posts = Vec::new();
    let walk = WalkDir::new(root).min_depth(POST_DEPTH).max_depth(POST_DEPTH);
    for entry in walk {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let parts = entry
            .path()
            .strip_prefix(root)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>();
        if parts.iter().any(|p| p.starts_with('.')) {
            continue;
        }
        let rel = parts.join("/");
        if DocType::from_path(&rel).is_some() {
            posts.push(rel);
        }
    }
    posts.sort();
    Ok(posts)
}

/// Renders one post, uploads the HTML next to the database and upserts its
/// record, keeping any fields already stored on it.
pub async fn render_one<B: Bucket, C: ContentSource + ?Sized>(
    db: &mut Database,
    dao: &Dao<B>,
    source: &C,
    path: &str,
    author: &str,
    prefix: &str,
) -> BoxResult<String> {
    let doc_type = match DocType::from_path(path) {
        Some(t) => t,
        None => bail!("unsupported content type: {}", path),
    };
    let src = source.read(path)?;
    let body = doc_type.render(&src)?;
    let title = match doc_type {
        DocType::Markdown => find_title(&src),
        DocType::Notebook => notebook_title(&src),
    }
    .unwrap_or_else(|| {
        let stem = without_extension(path);
        stem.rsplit('/').next().unwrap_or(&stem).to_string()
    });

    let key = content_key(path);
    let rendered = rendered_key(prefix, path);
    dao.bucket().put(&rendered, body.into_bytes(), HTML).await?;

    let mut record = db.remove(&key).unwrap_or_else(Record::new);
    let fields = [
        ("prettyname", key.clone()),
        ("title", title),
        ("author", author.to_string()),
        ("doc_type", doc_type.as_str().to_string()),
        ("rendered", rendered),
        ("src", source.locate(path)),
    ];
    for (field, value) in fields {
        record.insert(field.to_string(), Value::String(value));
    }
    db.insert(key.clone(), record);
    log::info!("rendered {} as {}", path, key);

    dao.save(db, Some(std::slice::from_ref(&key))).await?;
    Ok(key)
}

/// Deletes the rendered HTML and the record of a post.
pub async fn remove<B: Bucket>(
    db: &mut Database,
    dao: &Dao<B>,
    path: &str,
    prefix: &str,
) -> BoxResult<String> {
    let key = content_key(path);
    dao.bucket().delete(&rendered_key(prefix, path)).await?;
    if db.remove(&key).is_none() {
        log::warn!("no record under {}", key);
    }
    dao.save(db, Some(std::slice::from_ref(&key))).await?;
    log::info!("removed {}", key);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBucket;
    use serde_json::json;

    const NOTEBOOK: &str = r##"{
      "cells": [
        {"cell_type": "markdown", "metadata": {}, "source": ["# Fitting a Line\n", "Some *text*."]},
        {"cell_type": "code", "execution_count": 1, "metadata": {},
         "source": "print(1 < 2)",
         "outputs": [
           {"output_type": "stream", "name": "stdout", "text": ["True\n"]},
           {"output_type": "execute_result", "execution_count": 1, "metadata": {},
            "data": {"text/plain": ["<matplotlib>"]}},
           {"output_type": "display_data", "metadata": {},
            "data": {"image/png": "iVBORw0KGgo=\n", "text/plain": ["<Figure>"]}}
         ]},
        {"cell_type": "raw", "metadata": {}, "source": []}
      ],
      "metadata": {"language_info": {"name": "python"}},
      "nbformat": 4,
      "nbformat_minor": 2
    }"##;

    #[test]
    fn keys_from_paths() {
        assert_eq!(content_key("episodes/2019/foo.md"), "/episodes/2019/foo");
        assert_eq!(content_key("./blog/2018/x.y.ipynb"), "/blog/2018/x.y");
        assert_eq!(content_key("blog\\2018\\post.md"), "/blog/2018/post");
        assert_eq!(content_key("/episodes/.hidden"), "/episodes/.hidden");
        assert_eq!(rendered_key("blog/", "episodes/2019/foo.md"), "blog/episodes/2019/foo.htm");
    }

    #[test]
    fn doc_types() {
        assert_eq!(DocType::from_path("a/b.md"), Some(DocType::Markdown));
        assert_eq!(DocType::from_path("a/b.IPYNB"), Some(DocType::Notebook));
        assert_eq!(DocType::from_path("a/b.Rmd"), None);
        assert_eq!(DocType::from_path("a.d/readme"), None);
    }

    #[test]
    fn markdown_to_html() {
        let html = render_markdown("# Title\n\nSome **bold** text.\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h1>Title</h1>"), "{}", html);
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn titles() {
        assert_eq!(find_title("intro\n# The Death of a Language #\ntext"), Some("The Death of a Language".into()));
        assert_eq!(find_title("## only h2"), None);
        assert_eq!(
            find_title("```sh\n# install deps\npip install x\n```\n\n# Real Title\n"),
            Some("Real Title".into())
        );
        assert_eq!(find_title("    # indented code\n\nSetext `Title`\n===\n"), Some("Setext Title".into()));
        assert_eq!(notebook_title(NOTEBOOK), Some("Fitting a Line".into()));
    }

    #[test]
    fn notebook_to_html() {
        let html = render_notebook(NOTEBOOK).expect("render notebook failed");
        assert!(html.contains("<h1>Fitting a Line</h1>"), "{}", html);
        assert!(html.contains("<em>text</em>"));
        assert!(html.contains("<pre><code class=\"language-python\">print(1 &lt; 2)</code></pre>"));
        assert!(html.contains("<pre class=\"output\">True\n</pre>"));
        assert!(html.contains("<pre class=\"output\">&lt;matplotlib&gt;</pre>"));
        assert!(html.contains("<img src=\"data:image/png;base64,iVBORw0KGgo=\"/>"));
        assert!(!html.contains("&lt;Figure&gt;"));
    }

    #[test]
    fn malformed_notebook() {
        assert!(render_notebook("{\"cells\": 3}").is_err());
        assert!(DocType::Notebook.render("# not json").is_err());
    }

    #[test]
    fn lists_posts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("episodes/2019/drafts")).unwrap();
        std::fs::create_dir_all(root.join("blog/2018")).unwrap();
        std::fs::create_dir_all(root.join(".git/hooks")).unwrap();
        std::fs::write(root.join("episodes/2019/b.md"), "# B").unwrap();
        std::fs::write(root.join("episodes/2019/a.ipynb"), "{}").unwrap();
        std::fs::write(root.join("episodes/2019/c.Rmd"), "x").unwrap();
        std::fs::write(root.join("episodes/2019/drafts/z.md"), "x").unwrap();
        std::fs::write(root.join("episodes/top.md"), "x").unwrap();
        std::fs::write(root.join("blog/2018/post.md"), "x").unwrap();
        std::fs::write(root.join(".git/hooks/notes.md"), "x").unwrap();
        std::fs::write(root.join("README.md"), "x").unwrap();
        let posts = list_content(root).expect("list failed");
        assert_eq!(
            posts,
            vec!["blog/2018/post.md", "episodes/2019/a.ipynb", "episodes/2019/b.md"]
        );
    }

    #[test]
    fn github_location() {
        let src = GithubSource::new("data-skeptic/blog", "/master");
        assert_eq!(
            src.locate("episodes/2019/foo.md"),
            "https://raw.githubusercontent.com/data-skeptic/blog/master/episodes/2019/foo.md"
        );
    }

    #[tokio::test]
    async fn render_and_remove() {
        let content = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(content.path().join("episodes/2019")).unwrap();
        std::fs::write(
            content.path().join("episodes/2019/bots.md"),
            "# Negotiating Bots\n\nThey invented a language.\n",
        )
        .unwrap();
        let store = tempfile::tempdir().unwrap();
        let dao = Dao::new(LocalBucket::new(store.path()), "posts.db.json");

        let mut db: Database = serde_json::from_value(json!({
            "/episodes/2019/bots": {"guid": "g1", "duration": "3:56", "title": "old"}
        }))
        .unwrap();
        dao.save(&db, None).await.unwrap();

        let source = LocalSource::new(content.path());
        let key = render_one(&mut db, &dao, &source, "episodes/2019/bots.md", "kyle@dataskeptic.com", "blog/")
            .await
            .expect("render failed");
        assert_eq!(key, "/episodes/2019/bots");

        let html = dao.bucket().get("blog/episodes/2019/bots.htm").await.unwrap().unwrap();
        assert!(String::from_utf8(html).unwrap().contains("<h1>Negotiating Bots</h1>"));

        let stored = dao.load().await.unwrap();
        let rec = stored.get(&key).unwrap();
        assert_eq!(rec["title"], json!("Negotiating Bots"));
        assert_eq!(rec["guid"], json!("g1"));
        assert_eq!(rec["duration"], json!("3:56"));
        assert_eq!(rec["doc_type"], json!("md"));
        assert_eq!(rec["rendered"], json!("blog/episodes/2019/bots.htm"));
        assert_eq!(rec["author"], json!("kyle@dataskeptic.com"));

        remove(&mut db, &dao, "episodes/2019/bots.md", "blog/").await.expect("remove failed");
        assert!(!dao.load().await.unwrap().contains(&key));
        assert_eq!(dao.bucket().get("blog/episodes/2019/bots.htm").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unsupported_type_rejected() {
        let store = tempfile::tempdir().unwrap();
        let dao = Dao::new(LocalBucket::new(store.path()), "posts.db.json");
        let mut db = Database::new();
        let source = LocalSource::new(store.path());
        let res = render_one(&mut db, &dao, &source, "a/b.Rmd", "me", "blog/").await;
        assert!(res.is_err());
        assert!(db.is_empty());
    }
}
