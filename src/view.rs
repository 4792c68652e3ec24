//! Template rendering and the response helpers built on it.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use dashmap::DashMap;
use minijinja::Environment;
use serde::Serialize;
use serde_json::Value;

use crate::{AppError, Context, Result};

/// Default declaration prepended by [`Context::render_xml`].
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

pub trait ViewRenderer: Send + Sync {
    /// Render `view`, then `layout` around it when given. The layout sees
    /// the rendered view as `content`.
    fn render(&self, view: &Path, layout: Option<&Path>, data: &Value) -> Result<String>;

    /// Render an inline template.
    fn render_str(&self, source: &str, data: &Value) -> Result<String>;
}

/// Renders files with MiniJinja. `.html` templates are auto-escaped.
#[derive(Default)]
pub struct MiniJinjaRenderer {
    cache: Option<DashMap<PathBuf, String>>,
}

impl MiniJinjaRenderer {
    /// Reads every template from disk on each render.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps template sources in memory after the first read.
    pub fn cached() -> Self {
        Self {
            cache: Some(DashMap::new()),
        }
    }

    fn source(&self, path: &Path) -> Result<String> {
        let Some(cache) = &self.cache else {
            return read_template(path);
        };
        if let Some(source) = cache.get(path) {
            return Ok(source.clone());
        }
        let source = read_template(path)?;
        cache.insert(path.to_path_buf(), source.clone());
        Ok(source)
    }

    fn render_file(&self, path: &Path, ctx: minijinja::Value) -> Result<String> {
        let source = self.source(path)?;
        let name = path.to_string_lossy();
        let mut env = Environment::new();
        env.add_template(&name, &source)?;
        let rendered = env.get_template(&name)?.render(ctx)?;
        Ok(rendered)
    }
}

fn read_template(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| AppError::RenderError(format!("cannot read {}: {}", path.display(), e)))
}

impl ViewRenderer for MiniJinjaRenderer {
    fn render(&self, view: &Path, layout: Option<&Path>, data: &Value) -> Result<String> {
        let content = self.render_file(view, minijinja::Value::from_serialize(data))?;
        let Some(layout) = layout else {
            return Ok(content);
        };

        let mut ctx: BTreeMap<String, minijinja::Value> = match data {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), minijinja::Value::from_serialize(v)))
                .collect(),
            _ => BTreeMap::new(),
        };
        ctx.insert(
            "content".to_owned(),
            minijinja::Value::from_safe_string(content),
        );
        self.render_file(layout, minijinja::Value::from(ctx))
    }

    fn render_str(&self, source: &str, data: &Value) -> Result<String> {
        let env = Environment::new();
        let template = env.template_from_named_str("inline.html", source)?;
        let rendered = template.render(data)?;
        Ok(rendered)
    }
}

impl Context {
    /// Path of the view `name` (without suffix) of the current controller.
    /// An empty name selects the action's own view.
    pub fn view_file(&self, name: &str) -> Result<PathBuf> {
        let action = self
            .action()
            .ok_or_else(|| AppError::RenderError("no action bound to this request".into()))?;
        let suffix = &self.config().view.suffix;
        let file = if name.is_empty() {
            format!("{}{}", action.pretty_name(), suffix)
        } else {
            format!("{name}{suffix}")
        };
        Ok(action.controller().views_path().join(file))
    }

    /// Render the action's view inside the controller layout.
    pub fn render<T: Serialize>(&mut self, data: &T) -> Result<()> {
        self.render_file("", data)
    }

    pub fn render_file<T: Serialize>(&mut self, name: &str, data: &T) -> Result<()> {
        let view = self.view_file(name)?;
        let layout = match self.action() {
            Some(action) if self.layout_enabled() => {
                action.controller().layout().map(Path::to_path_buf)
            }
            _ => None,
        };
        let body = self
            .app()
            .renderer()
            .render(&view, layout.as_deref(), &serde_json::to_value(data)?)?;
        self.response_mut().set_html_header();
        self.response_mut().set_body(body);
        Ok(())
    }

    /// Render the action's view without a layout.
    pub fn render_partial<T: Serialize>(&mut self, data: &T) -> Result<()> {
        self.render_partial_file("", data)
    }

    pub fn render_partial_file<T: Serialize>(&mut self, name: &str, data: &T) -> Result<()> {
        let view = self.view_file(name)?;
        let body = self
            .app()
            .renderer()
            .render(&view, None, &serde_json::to_value(data)?)?;
        self.response_mut().set_html_header();
        self.response_mut().set_body(body);
        Ok(())
    }

    /// Render an inline template.
    pub fn render_data<T: Serialize>(&mut self, source: &str, data: &T) -> Result<()> {
        let body = self
            .app()
            .renderer()
            .render_str(source, &serde_json::to_value(data)?)?;
        self.response_mut().set_html_header();
        self.response_mut().set_body(body);
        Ok(())
    }

    pub fn render_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let body = serde_json::to_string(value)?;
        self.render_json_raw(body);
        Ok(())
    }

    /// Send already encoded JSON.
    pub fn render_json_raw(&mut self, json: impl Into<String>) {
        self.response_mut().set_json_header();
        self.response_mut().set_body(json);
    }

    pub fn render_jsonp<T: Serialize>(&mut self, value: &T, callback: &str) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.response_mut().set_jsonp_header();
        self.response_mut().set_body(format!("{callback}({json})"));
        Ok(())
    }

    /// Serialize `value` as indented XML after `header`, or [`XML_HEADER`]
    /// when no header or an empty one is given.
    pub fn render_xml<T: Serialize>(&mut self, value: &T, header: Option<&str>) -> Result<()> {
        let header = header.filter(|h| !h.is_empty()).unwrap_or(XML_HEADER);
        let mut xml = String::from(header);
        let mut serializer = quick_xml::se::Serializer::new(&mut xml);
        serializer.indent(' ', 3);
        value
            .serialize(serializer)
            .map_err(|e| AppError::SerializationError(e.to_string()))?;
        self.response_mut().set_xml_header();
        self.response_mut().set_body(xml);
        Ok(())
    }

    pub fn render_text(&mut self, text: impl Into<String>) {
        self.response_mut().set_html_header();
        self.response_mut().set_body(text);
    }
}
