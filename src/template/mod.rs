//! Templating code.
//!
//! This defines the [`Page`] item, which is used to wrap every full page the
//! server returns.

use hypertext::prelude::*;

use crate::{auth::User, tracks::Track};

pub struct Page<R1: Renderable, R2: Renderable = String> {
    body: Option<R1>,
    user: Option<User>,
    judge_name: Option<String>,
    extra_head: Option<R2>,
    track: Option<Track>,
}

// unfortunate generic argument shenanigans
impl<R1: Renderable> Page<R1, String> {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<R1: Renderable, R2: Renderable> Page<R1, R2> {
    pub fn new_full() -> Self {
        Default::default()
    }

    pub fn track(mut self, track: Track) -> Self {
        self.track = Some(track);
        self
    }

    pub fn body(mut self, body: R1) -> Self {
        self.body = Some(body);
        self
    }

    pub fn user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn user_opt(mut self, user: Option<User>) -> Self {
        self.user = user;
        self
    }

    /// Shows the name of the judge who is signed in (judges do not have user
    /// accounts).
    pub fn judge_name(mut self, name: &str) -> Self {
        self.judge_name = Some(name.to_string());
        self
    }

    pub fn extra_head(mut self, content: R2) -> Page<R1, R2> {
        self.extra_head = Some(content);
        self
    }
}

impl<R1: Renderable, R2: Renderable> Renderable for Page<R1, R2> {
    fn render_to(
        &self,
        buffer: &mut hypertext::Buffer<hypertext::context::Node>,
    ) {
        maud! {
            html {
                head {
                    title {
                        @if let Some(track) = &self.track {
                            (track.title) " | "
                        }
                        "Expotab"
                    }
                    script src="https://cdn.jsdelivr.net/npm/htmx.org@2.0.7/dist/htmx.min.js" integrity="sha384-ZBXiYtYQ6hJ2Y0ZNoYuI+Nq5MqWBr+chMrS/RkXpNzQCApHEhOt2aY8EJgqwHLkJ" crossorigin="anonymous" {
                    }
                    link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" crossorigin="anonymous";
                    meta
                        name="viewport"
                        content="width=device-width, initial-scale=1";
                    @if let Some(extra) = &self.extra_head {
                        (extra)
                    }
                }
                body class="d-flex flex-column vh-100" {
                    nav class="navbar navbar-expand"
                        style="background-color: #1f3b57;"
                        data-bs-theme="dark" {
                        div class="container-fluid" {
                            @if let Some(track) = &self.track {
                                a class="navbar-brand text-white"
                                  href=(format!("/tracks/{}/leaderboard", track.id)) {
                                    (track.title)
                                }
                            } @else {
                                a class="navbar-brand text-white" href="/" {
                                    "Expotab"
                                }
                            }
                            ul class="navbar-nav me-auto" {
                                li class="nav-item" {
                                    a class="nav-link text-white" href="/leaderboard" {
                                        "Leaderboards"
                                    }
                                }
                                @if let Some(track) = &self.track {
                                    @if self.user.is_some() {
                                        li class="nav-item" {
                                            a class="nav-link text-white" href=(format!("/tracks/{}", track.id)) {
                                                "Manage"
                                            }
                                        }
                                        li class="nav-item" {
                                            a class="nav-link text-white" href=(format!("/tracks/{}/tabulation", track.id)) {
                                                "Tabulation"
                                            }
                                        }
                                    }
                                }
                            }
                            ul class="navbar-nav" {
                                @if let Some(name) = &self.judge_name {
                                    li class="nav-item" {
                                        a class="nav-link text-white" href="/judge" {
                                            (name)
                                        }
                                    }
                                    li class="nav-item" {
                                        a class="nav-link text-white" href="/judge/logout" {
                                            "Sign out"
                                        }
                                    }
                                } @else if let Some(user) = &self.user {
                                    li class="nav-item" {
                                        a class="nav-link text-white" href="/" {
                                            (user.username)
                                        }
                                    }
                                    li class="nav-item" {
                                        a class="nav-link text-white" href="/logout" {
                                            "Log out"
                                        }
                                    }
                                } @else {
                                    li class="nav-item" {
                                        a class="nav-link text-white" href="/judge/login" {
                                            "Judges"
                                        }
                                    }
                                    li class="nav-item" {
                                        a class="nav-link text-white" href="/login" {
                                            "Login"
                                        }
                                    }
                                    li class="nav-item" {
                                        a class="nav-link text-white" href="/register" {
                                            "Register"
                                        }
                                    }
                                }
                            }
                        }
                    }
                    div class="flex-grow-1" {
                        @if let Some(body) = &self.body {
                            (body)
                        }
                    }
                }
            }
        }.render_to(buffer)
    }
}

impl<R1: Renderable, R2: Renderable> Default for Page<R1, R2> {
    fn default() -> Self {
        Self {
            body: Default::default(),
            user: Default::default(),
            judge_name: Default::default(),
            extra_head: Default::default(),
            track: Default::default(),
        }
    }
}
