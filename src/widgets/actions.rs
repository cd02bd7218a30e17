use hypertext::prelude::*;

/// A row of links styled as buttons.
pub struct Actions<'r> {
    pub options: &'r [(String, &'r str)],
}

impl<'r> Renderable for Actions<'r> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud! {
            div class = "row mt-3 mb-3" {
                @for (link, text) in self.options {
                    div class = "col-md-auto" {
                        a class="btn btn-outline-primary"
                            href=(link) {
                            (text)
                        }
                    }
                }
            }
        }
        .render_to(buffer);
    }
}

/// A button which submits an empty form to `action`. Used for state
/// changes, which are never made over GET.
pub struct PostButton<'r> {
    pub action: &'r str,
    pub label: &'r str,
    pub class: &'r str,
}

impl<'r> Renderable for PostButton<'r> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud! {
            form method="post" action=(self.action) class="d-inline" {
                button type="submit" class=(format!("btn btn-sm {}", self.class)) {
                    (self.label)
                }
            }
        }
        .render_to(buffer);
    }
}
