use hypertext::{Renderable, maud, prelude::*};

/// Wraps content which the public cannot see yet, because the track is
/// still being set up.
pub struct NonPublic<T: Renderable> {
    pub children: T,
    pub title: &'static str,
}

impl<T: Renderable> Renderable for NonPublic<T> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud! {
            div class="card bg-light-subtle mb-4" {
                div class="card-header" {
                    h5 class="card-title" {
                       (self.title)
                    }
                    p class="card-subtitle text-muted" {
                        "This track is in setup. Judges cannot score and the leaderboard is not listed until it goes live."
                    }
                }
                div class="card-body" {
                    (self.children)
                }
            }
        }.render_to(buffer)
    }
}
