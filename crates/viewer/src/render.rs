use recipebot_core::{Message, RunResult};
use serde::Serialize;
use tera::{Context, Tera};

use crate::ViewerError;

pub const TEMPLATE_NAME: &str = "conversations.html.tera";

#[derive(Debug, Serialize)]
struct PageView<'a> {
    number: usize,
    id: &'a str,
    query: &'a str,
    messages: Vec<MessageView<'a>>,
}

#[derive(Debug, Serialize)]
struct MessageView<'a> {
    role: &'static str,
    label: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for MessageView<'a> {
    fn from(message: &'a Message) -> Self {
        Self { role: message.role.as_str(), label: message.role.label(), content: &message.content }
    }
}

/// Renders result artifacts as one self-contained HTML document with a page
/// per conversation. All interpolated text is HTML-escaped.
#[derive(Clone, Debug)]
pub struct ConversationRenderer {
    tera: Tera,
}

impl ConversationRenderer {
    pub fn new() -> Result<Self, ViewerError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html.tera"]);
        tera.add_raw_template(
            TEMPLATE_NAME,
            include_str!("../../../templates/viewer/conversations.html.tera"),
        )
        .map_err(|error| ViewerError::Template(error.to_string()))?;
        Ok(Self { tera })
    }

    pub fn render(&self, results: &[RunResult], source: &str) -> Result<String, ViewerError> {
        let pages = results
            .iter()
            .enumerate()
            .map(|(index, result)| PageView {
                number: index + 1,
                id: &result.id.0,
                query: &result.initial_query,
                messages: result.conversation.iter().map(MessageView::from).collect(),
            })
            .collect::<Vec<_>>();

        let mut context = Context::new();
        context.insert("title", "Recipe conversations");
        context.insert("source", source);
        context.insert("total", &pages.len());
        context.insert("pages", &pages);

        self.tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|error| ViewerError::Template(error.to_string()))
    }
}
