use serde::Serialize;

use manos_notes_core::{Editor, LinkPreviewAttrs};

use super::NodeHandle;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkPreviewRender {
    pub id: String,
    pub url: String,
    pub badge: String,
    pub provider: Option<String>,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

pub struct LinkPreviewView {
    handle: NodeHandle,
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

impl LinkPreviewView {
    pub(super) fn new(handle: NodeHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    /// Card contents. Missing titles fall back to the provider, then the host.
    pub fn render(&self, editor: &Editor) -> Option<LinkPreviewRender> {
        let attrs = LinkPreviewAttrs::from_attrs(self.handle.attrs(editor)?);
        let title = attrs
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| attrs.provider.clone())
            .unwrap_or_else(|| host_of(&attrs.url).to_string());
        Some(LinkPreviewRender {
            id: self.handle.id().to_string(),
            badge: attrs.kind.to_uppercase(),
            url: attrs.url,
            provider: attrs.provider,
            title,
            subtitle: attrs.subtitle,
            description: attrs.description,
            thumbnail: attrs.image_url,
        })
    }

    pub fn delete(&self, editor: &mut Editor) -> bool {
        self.handle.remove(editor)
    }
}

#[cfg(test)]
mod tests {
    use super::host_of;

    #[test]
    fn host_is_taken_from_the_url() {
        assert_eq!(host_of("https://www.ft.com/content/1?x=2"), "www.ft.com");
        assert_eq!(host_of("example.com"), "example.com");
    }
}
