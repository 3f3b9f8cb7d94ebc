// ===============================
// src/pages.rs
// ===============================
//
// Role page shells: which views a role offers and what a view mounts.
//
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    MiddleOffice,
    TraderSales,
    Support,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Default,
    Actions,
    Static,
    Search,
    Dashboard,
    History,
    Validation,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::MiddleOffice, Role::TraderSales, Role::Support];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::MiddleOffice => "middle-office",
            Role::TraderSales => "trader-sales",
            Role::Support => "support",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Role::MiddleOffice => "Middle Office",
            Role::TraderSales => "Trader Sales",
            Role::Support => "Support",
        }
    }

    pub fn views(&self) -> &'static [View] {
        match self {
            Role::MiddleOffice => &[
                View::Default,
                View::Actions,
                View::Static,
                View::Search,
                View::Dashboard,
            ],
            Role::TraderSales => &[
                View::Default,
                View::Actions,
                View::History,
                View::Search,
                View::Dashboard,
                View::Validation,
            ],
            Role::Support => &[View::Default, View::Actions, View::Search, View::Dashboard],
        }
    }

    pub fn offers(&self, view: View) -> bool {
        self.views().contains(&view)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "middle-office" | "middleoffice" | "mo" => Ok(Role::MiddleOffice),
            "trader-sales" | "tradersales" | "trader" | "sales" => Ok(Role::TraderSales),
            "support" => Ok(Role::Support),
            other => Err(format!(
                "unknown role '{other}' (expected one of: {})",
                Role::ALL.map(|r| r.as_str()).join(", ")
            )),
        }
    }
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Default => "default",
            View::Actions => "actions",
            View::Static => "static",
            View::Search => "search",
            View::Dashboard => "dashboard",
            View::History => "history",
            View::Validation => "validation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" | "home" => Some(View::Default),
            "actions" => Some(View::Actions),
            "static" => Some(View::Static),
            "search" => Some(View::Search),
            "dashboard" => Some(View::Dashboard),
            "history" => Some(View::History),
            "validation" => Some(View::Validation),
            _ => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads `view` from a query string like `view=search&x=1`.
/// Missing means the home view; an unknown value is `None`.
pub fn view_from_query(query: &str) -> Option<View> {
    let query = query.trim_start_matches('?');
    match url::form_urlencoded::parse(query.as_bytes()).find(|(k, _)| k == "view") {
        Some((_, v)) => View::parse(&v),
        None => Some(View::Default),
    }
}

/// What a page shell shows for a (role, view) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Search,
    Dashboard,
    Validation,
    /// Actions / static data / history: owned by other screens.
    Delegated(View),
    /// The role does not offer this view.
    Blank,
}

pub fn mount(role: Role, view: View) -> Screen {
    if !role.offers(view) {
        return Screen::Blank;
    }
    match view {
        View::Default => Screen::Home,
        View::Search => Screen::Search,
        View::Dashboard => Screen::Dashboard,
        View::Validation => Screen::Validation,
        View::Actions | View::Static | View::History => Screen::Delegated(view),
    }
}

/// Home quick-access entries. Every role's home offers all three.
pub const QUICK_ACCESS: [View; 3] = [View::Search, View::Dashboard, View::Validation];

/// What a home quick-access entry mounts, whatever the role's view table says.
pub fn launch(view: View) -> Option<Screen> {
    match view {
        View::Search => Some(Screen::Search),
        View::Dashboard => Some(Screen::Dashboard),
        View::Validation => Some(Screen::Validation),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_view_tables() {
        assert_eq!(mount(Role::MiddleOffice, View::Static), Screen::Delegated(View::Static));
        assert_eq!(mount(Role::MiddleOffice, View::Validation), Screen::Blank);
        assert_eq!(mount(Role::TraderSales, View::Validation), Screen::Validation);
        assert_eq!(mount(Role::TraderSales, View::Static), Screen::Blank);
        assert_eq!(mount(Role::Support, View::History), Screen::Blank);
        for role in Role::ALL {
            assert_eq!(mount(role, View::Default), Screen::Home);
            assert_eq!(mount(role, View::Search), Screen::Search);
            assert_eq!(mount(role, View::Dashboard), Screen::Dashboard);
        }
    }

    #[test]
    fn home_launches_every_modal_for_every_role() {
        assert_eq!(launch(View::Validation), Some(Screen::Validation));
        assert_eq!(launch(View::Search), Some(Screen::Search));
        assert_eq!(launch(View::Dashboard), Some(Screen::Dashboard));
        assert_eq!(launch(View::History), None);
        assert_eq!(launch(View::Default), None);
    }

    #[test]
    fn view_selector_from_query() {
        assert_eq!(view_from_query(""), Some(View::Default));
        assert_eq!(view_from_query("?tab=2"), Some(View::Default));
        assert_eq!(view_from_query("?view=dashboard"), Some(View::Dashboard));
        assert_eq!(view_from_query("x=1&view=validation"), Some(View::Validation));
        assert_eq!(view_from_query("view=settings"), None);
    }

    #[test]
    fn role_names_parse() {
        assert_eq!("middle_office".parse::<Role>(), Ok(Role::MiddleOffice));
        assert_eq!("Trader-Sales".parse::<Role>(), Ok(Role::TraderSales));
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(Role::Support.to_string(), "support");
    }
}
