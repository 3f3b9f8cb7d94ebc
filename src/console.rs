// ===============================
// src/console.rs
// ===============================
//
// Line-oriented page shell. One screen is mounted at a time; opening a
// modal builds a fresh controller, closing it drops the controller (and
// for the dashboard, stops its refresh task).
//
// Network work is spawned, so the prompt stays live and loading states
// get rendered; completions arrive through `Shell::updates()`.
//
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::TradeApi;
use crate::dashboard::{
    DashboardAction, DashboardController, DashboardState, DashboardTab, RefreshGuard,
};
use crate::domain::{SearchField, SortDir, Trade, SORT_FIELDS};
use crate::metrics::NOTICES;
use crate::notify::{Notice, NoticeKind};
use crate::pages::{launch, mount, Role, Screen, View, QUICK_ACCESS};
use crate::render::{
    render_dashboard, render_delegated, render_home, render_notice, render_search,
    render_validation, Palette,
};
use crate::search::{PageEdit, SearchAction, SearchController, SearchMode, SearchState};
use crate::session::{sign_in, Session};
use crate::validation::{
    load_trade, TradeFileError, ValidationAction, ValidationController, ValidationMode,
    ValidationState,
};

pub const HELP: &str = "\
Commands:
  open <view>              home | search | dashboard | validation | actions | static | history
  launch <screen>          from home: search | dashboard | validation
  close                    close the current screen
  login <id> <password>    sign in;  logout;  whoami
  show | dismiss           redraw the screen | hide the notification
Search:
  mode basic|advanced|rsql
  set <field> <value>      counterparty | book | status | start | end   (unset <field>)
  page <n> | size <n> | sort <field> [asc|desc]
  query <rsql>             e.g. query tradeStatus.tradeStatus==LIVE
  search | clear
Dashboard:
  tab summary|blotter|trader   next | prev | size <n> | sort <field> [asc|desc] | refresh
Validation:
  mode create|amend|read   trade <file.json> | newtrade   validate | clear
  help | quit
";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("unknown {what} '{value}'")]
    Invalid { what: &'static str, value: String },
    #[error("`{0}` is not available on this screen")]
    NotHere(&'static str),
    #[error("{0} is already running")]
    Busy(&'static str),
    #[error(transparent)]
    Trade(#[from] TradeFileError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Show,
    Dismiss,
    Open(View),
    Launch(View),
    Close,
    Login { login: String, password: String },
    Logout,
    WhoAmI,
    Mode(String),
    Set(SearchField, String),
    Unset(SearchField),
    Query(String),
    Page(u32),
    Size(u32),
    Sort { field: String, dir: SortDir },
    Search,
    Clear,
    Tab(DashboardTab),
    Next,
    Prev,
    Refresh,
    Validate,
    LoadTrade(PathBuf),
    NewTrade,
}

fn number(arg: Option<&str>, usage: &'static str) -> Result<u32, CommandError> {
    let raw = arg.ok_or(CommandError::Usage(usage))?;
    raw.parse().map_err(|_| CommandError::Invalid {
        what: "number",
        value: raw.to_string(),
    })
}

fn field(arg: Option<&str>, usage: &'static str) -> Result<SearchField, CommandError> {
    let raw = arg.ok_or(CommandError::Usage(usage))?;
    SearchField::parse(raw).ok_or_else(|| CommandError::Invalid {
        what: "search field",
        value: raw.to_string(),
    })
}

impl Command {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        let cmd = match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "show" => Command::Show,
            "dismiss" => Command::Dismiss,
            "open" | "view" => {
                let raw = args.next().unwrap_or("default");
                let view = View::parse(raw).ok_or_else(|| CommandError::Invalid {
                    what: "view",
                    value: raw.to_string(),
                })?;
                Command::Open(view)
            }
            "home" => Command::Open(View::Default),
            "launch" => {
                let raw = args.next().ok_or(CommandError::Usage("launch <screen>"))?;
                let view = View::parse(raw)
                    .filter(|v| QUICK_ACCESS.contains(v))
                    .ok_or_else(|| CommandError::Invalid {
                        what: "screen",
                        value: raw.to_string(),
                    })?;
                Command::Launch(view)
            }
            "close" => Command::Close,
            "login" => match (args.next(), args.next()) {
                (Some(login), Some(password)) => Command::Login {
                    login: login.to_string(),
                    password: password.to_string(),
                },
                _ => return Err(CommandError::Usage("login <id> <password>")),
            },
            "logout" => Command::Logout,
            "whoami" => Command::WhoAmI,
            "mode" => match args.next() {
                Some(m) => Command::Mode(m.to_string()),
                None => return Err(CommandError::Usage("mode <name>")),
            },
            "set" => {
                let f = field(args.next(), "set <field> <value>")?;
                let value = rest
                    .split_once(char::is_whitespace)
                    .map(|(_, v)| v.trim())
                    .unwrap_or("");
                if value.is_empty() {
                    return Err(CommandError::Usage("set <field> <value>"));
                }
                Command::Set(f, value.to_string())
            }
            "unset" => Command::Unset(field(args.next(), "unset <field>")?),
            "query" => Command::Query(rest.to_string()),
            "page" => Command::Page(number(args.next(), "page <n>")?),
            "size" => Command::Size(number(args.next(), "size <n>")?),
            "sort" => {
                let raw = args.next().ok_or(CommandError::Usage("sort <field> [asc|desc]"))?;
                let field = SORT_FIELDS
                    .iter()
                    .find(|f| f.eq_ignore_ascii_case(raw))
                    .ok_or_else(|| CommandError::Invalid {
                        what: "sort field",
                        value: raw.to_string(),
                    })?;
                let dir = match args.next() {
                    Some(d) => SortDir::parse(d).ok_or_else(|| CommandError::Invalid {
                        what: "sort direction",
                        value: d.to_string(),
                    })?,
                    None => SortDir::Desc,
                };
                Command::Sort {
                    field: field.to_string(),
                    dir,
                }
            }
            "search" => Command::Search,
            "clear" => Command::Clear,
            "tab" => {
                let raw = args.next().ok_or(CommandError::Usage("tab summary|blotter|trader"))?;
                let tab = DashboardTab::parse(raw).ok_or_else(|| CommandError::Invalid {
                    what: "tab",
                    value: raw.to_string(),
                })?;
                Command::Tab(tab)
            }
            "next" => Command::Next,
            "prev" | "previous" => Command::Prev,
            "refresh" => Command::Refresh,
            "validate" => Command::Validate,
            "trade" => match args.next() {
                Some(path) => Command::LoadTrade(PathBuf::from(path)),
                None => return Err(CommandError::Usage("trade <file.json>")),
            },
            "newtrade" => Command::NewTrade,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(cmd))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Quit => "quit",
            Command::Show => "show",
            Command::Dismiss => "dismiss",
            Command::Open(_) => "open",
            Command::Launch(_) => "launch",
            Command::Close => "close",
            Command::Login { .. } => "login",
            Command::Logout => "logout",
            Command::WhoAmI => "whoami",
            Command::Mode(_) => "mode",
            Command::Set(..) => "set",
            Command::Unset(_) => "unset",
            Command::Query(_) => "query",
            Command::Page(_) => "page",
            Command::Size(_) => "size",
            Command::Sort { .. } => "sort",
            Command::Search => "search",
            Command::Clear => "clear",
            Command::Tab(_) => "tab",
            Command::Next => "next",
            Command::Prev => "prev",
            Command::Refresh => "refresh",
            Command::Validate => "validate",
            Command::LoadTrade(_) => "trade",
            Command::NewTrade => "newtrade",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub refresh_every: Duration,
    pub palette: Palette,
    /// Trade the validation screen starts with (draft when absent).
    pub trade: Option<Trade>,
}

enum Modal<A: TradeApi + ?Sized + 'static> {
    Search(Arc<SearchController<A>>),
    Dashboard(Arc<DashboardController<A>>, RefreshGuard),
    Validation(Arc<ValidationController<A>>),
}

/// Change feed of the mounted modal; owned, so it can be awaited while the shell is used.
#[derive(Clone)]
pub enum Updates {
    Idle,
    Search(watch::Receiver<Arc<SearchState>>),
    Dashboard(watch::Receiver<Arc<DashboardState>>),
    Validation(watch::Receiver<Arc<ValidationState>>),
}

impl Updates {
    /// Resolves on the next state change; never resolves when idle.
    pub async fn changed(mut self) {
        let alive = match &mut self {
            Updates::Idle => false,
            Updates::Search(rx) => rx.changed().await.is_ok(),
            Updates::Dashboard(rx) => rx.changed().await.is_ok(),
            Updates::Validation(rx) => rx.changed().await.is_ok(),
        };
        if !alive {
            std::future::pending::<()>().await;
        }
    }

    fn mark_seen(&mut self) {
        match self {
            Updates::Idle => {}
            Updates::Search(rx) => {
                rx.borrow_and_update();
            }
            Updates::Dashboard(rx) => {
                rx.borrow_and_update();
            }
            Updates::Validation(rx) => {
                rx.borrow_and_update();
            }
        }
    }
}

pub enum Step {
    Continue(String),
    Quit,
}

pub struct Shell<A: TradeApi + ?Sized + 'static> {
    api: Arc<A>,
    session: Session,
    role: Role,
    options: ShellOptions,
    screen: Screen,
    modal: Option<Modal<A>>,
    feed: Updates,
    last_frame: String,
    last_notice: Option<u64>,
}

impl<A: TradeApi + ?Sized + 'static> Shell<A> {
    pub fn new(api: Arc<A>, session: Session, role: Role, options: ShellOptions) -> Self {
        Self {
            api,
            session,
            role,
            options,
            screen: Screen::Home,
            modal: None,
            feed: Updates::Idle,
            last_frame: String::new(),
            last_notice: None,
        }
    }

    pub fn updates(&self) -> Updates {
        self.feed.clone()
    }

    /// Mounts the screen for `view`, replacing whatever was open.
    pub async fn open(&mut self, view: View) -> String {
        self.show(mount(self.role, view), view).await
    }

    async fn show(&mut self, screen: Screen, view: View) -> String {
        self.close_modal().await;
        self.screen = screen;
        self.last_notice = None;

        match screen {
            Screen::Search => {
                let ctl = Arc::new(SearchController::new(self.api.clone()));
                self.feed = Updates::Search(ctl.subscribe());
                self.modal = Some(Modal::Search(ctl));
            }
            Screen::Dashboard => {
                let ctl = Arc::new(DashboardController::new(
                    self.api.clone(),
                    self.session.clone(),
                    self.options.refresh_every,
                ));
                self.feed = Updates::Dashboard(ctl.subscribe());
                let guard = ctl.open();
                self.modal = Some(Modal::Dashboard(ctl, guard));
            }
            Screen::Validation => {
                let trade = self.options.trade.clone().unwrap_or_else(Trade::draft);
                let ctl = Arc::new(ValidationController::with_trade(
                    self.api.clone(),
                    self.session.clone(),
                    trade,
                ));
                self.feed = Updates::Validation(ctl.subscribe());
                self.modal = Some(Modal::Validation(ctl));
            }
            Screen::Blank => {
                debug!(role = %self.role, view = %view, "view not offered for role");
            }
            Screen::Home | Screen::Delegated(_) => {}
        }
        info!(role = %self.role, view = %view, screen = ?screen, "screen mounted");
        self.refresh_view(true)
    }

    async fn close_modal(&mut self) {
        self.feed = Updates::Idle;
        match self.modal.take() {
            Some(Modal::Dashboard(_, guard)) => guard.close().await,
            Some(_) => {}
            None => return,
        }
        debug!("modal closed");
    }

    pub async fn shutdown(&mut self) {
        self.close_modal().await;
    }

    fn frame(&self) -> (String, Option<Notice>) {
        let palette = self.options.palette;
        match &self.modal {
            Some(Modal::Search(ctl)) => {
                let st = ctl.state();
                (render_search(&st, palette), st.snackbar.current.clone())
            }
            Some(Modal::Dashboard(ctl, _)) => {
                let st = ctl.state();
                (render_dashboard(&st, palette), st.snackbar.current.clone())
            }
            Some(Modal::Validation(ctl)) => {
                let st = ctl.state();
                let login = self.session.login_id();
                (
                    render_validation(&st, login.as_deref(), palette),
                    st.snackbar.current.clone(),
                )
            }
            None => match self.screen {
                Screen::Home => (
                    render_home(self.role, self.session.current().as_deref(), palette),
                    None,
                ),
                Screen::Delegated(view) => (render_delegated(view), None),
                _ => (String::new(), None),
            },
        }
    }

    /// Text to print for the current state: the screen when it changed
    /// (or always with `force`), plus a notification not shown before.
    pub fn refresh_view(&mut self, force: bool) -> String {
        self.feed.mark_seen();
        let (frame, notice) = self.frame();
        let mut out = String::new();
        if force || frame != self.last_frame {
            out.push_str(&frame);
            self.last_frame = frame;
        }
        if let Some(notice) = notice {
            if self.last_notice != Some(notice.id) {
                self.last_notice = Some(notice.id);
                out.push_str(&self.announce(&notice));
            }
        }
        out
    }

    fn announce(&self, notice: &Notice) -> String {
        NOTICES.with_label_values(&[notice.kind.label()]).inc();
        let mut line = render_notice(notice, self.options.palette);
        line.push('\n');
        line
    }

    pub async fn execute(&mut self, cmd: Command) -> Result<Step, CommandError> {
        let out = match cmd {
            Command::Help => HELP.to_string(),
            Command::Quit => {
                self.close_modal().await;
                return Ok(Step::Quit);
            }
            Command::Show => self.refresh_view(true),
            Command::Open(view) => self.open(view).await,
            Command::Launch(view) => match (self.screen, self.modal.is_some(), launch(view)) {
                (Screen::Home, false, Some(screen)) => self.show(screen, view).await,
                _ => return Err(CommandError::NotHere("launch")),
            },
            Command::Close => {
                self.close_modal().await;
                self.screen = Screen::Home;
                self.refresh_view(true)
            }
            Command::Login { login, password } => self.login(&login, &password).await,
            Command::Logout => {
                self.session.clear();
                info!("signed out");
                let mut out = self.announce(&Notice {
                    id: 0,
                    kind: NoticeKind::Success,
                    message: "Signed out".to_string(),
                });
                out.push_str(&self.refresh_view(false));
                out
            }
            Command::WhoAmI => match self.session.current() {
                Some(u) => format!(
                    "{} (id {})\n",
                    u.login_id.as_deref().unwrap_or("-"),
                    u.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
                ),
                None => "Not logged in\n".to_string(),
            },
            Command::Dismiss => {
                match &self.modal {
                    Some(Modal::Search(c)) => {
                        c.dispatch(SearchAction::DismissNotice);
                    }
                    Some(Modal::Dashboard(c, _)) => {
                        c.dispatch(DashboardAction::DismissNotice);
                    }
                    Some(Modal::Validation(c)) => {
                        c.dispatch(ValidationAction::DismissNotice);
                    }
                    None => {}
                }
                self.refresh_view(false)
            }
            other => {
                self.on_modal(other)?;
                self.refresh_view(false)
            }
        };
        Ok(Step::Continue(out))
    }

    async fn login(&mut self, login: &str, password: &str) -> String {
        let notice = match sign_in(self.api.as_ref(), &self.session, login, password).await {
            Ok(user) => Notice {
                id: 0,
                kind: NoticeKind::Success,
                message: format!(
                    "Signed in as {}",
                    user.login_id.as_deref().unwrap_or(login)
                ),
            },
            Err(e) => {
                warn!(login, error = %e, "sign-in failed");
                Notice {
                    id: 0,
                    kind: NoticeKind::Error,
                    message: format!("Sign-in failed: {}", e.user_message()),
                }
            }
        };
        let mut out = self.announce(&notice);
        out.push_str(&self.refresh_view(false));
        out
    }

    fn on_modal(&self, cmd: Command) -> Result<(), CommandError> {
        match (self.modal.as_ref(), cmd) {
            // ---- search ----
            (Some(Modal::Search(c)), Command::Mode(m)) => {
                let mode = SearchMode::parse(&m).ok_or(CommandError::Invalid {
                    what: "search mode",
                    value: m,
                })?;
                c.dispatch(SearchAction::SetMode(mode));
            }
            (Some(Modal::Search(c)), Command::Set(f, v)) => {
                c.dispatch(SearchAction::SetField(f, v));
            }
            (Some(Modal::Search(c)), Command::Unset(f)) => {
                c.dispatch(SearchAction::SetField(f, String::new()));
            }
            (Some(Modal::Search(c)), Command::Query(q)) => {
                c.dispatch(SearchAction::SetRsql(q));
            }
            (Some(Modal::Search(c)), Command::Page(n)) => {
                c.dispatch(SearchAction::EditPage(PageEdit::Page(n)));
            }
            (Some(Modal::Search(c)), Command::Size(n)) => {
                c.dispatch(SearchAction::EditPage(PageEdit::Size(n)));
            }
            (Some(Modal::Search(c)), Command::Sort { field, dir }) => {
                c.dispatch(SearchAction::EditPage(PageEdit::SortBy(field)));
                c.dispatch(SearchAction::EditPage(PageEdit::SortDir(dir)));
            }
            (Some(Modal::Search(c)), Command::Search) => {
                if !c.state().search_enabled() {
                    return Err(CommandError::Busy("search"));
                }
                let c = c.clone();
                tokio::spawn(async move {
                    c.search().await;
                });
            }
            (Some(Modal::Search(c)), Command::Clear) => {
                c.clear();
            }

            // ---- dashboard ----
            (Some(Modal::Dashboard(c, _)), Command::Tab(DashboardTab::Trader)) => {
                let c = c.clone();
                tokio::spawn(async move {
                    c.show_trader_blotter().await;
                });
            }
            (Some(Modal::Dashboard(c, _)), Command::Tab(tab)) => {
                c.dispatch(DashboardAction::SelectTab(tab));
            }
            (Some(Modal::Dashboard(c, _)), Command::Next) => {
                c.dispatch(DashboardAction::NextPage);
            }
            (Some(Modal::Dashboard(c, _)), Command::Prev) => {
                c.dispatch(DashboardAction::PrevPage);
            }
            (Some(Modal::Dashboard(c, _)), Command::Size(n)) => {
                c.dispatch(DashboardAction::SetPageSize(n));
            }
            (Some(Modal::Dashboard(c, _)), Command::Sort { field, dir }) => {
                c.dispatch(DashboardAction::SetSort(format!("{field},{}", dir.as_str())));
            }
            (Some(Modal::Dashboard(c, _)), Command::Refresh) => {
                let c = c.clone();
                tokio::spawn(async move {
                    c.refresh().await;
                });
            }

            // ---- validation ----
            (Some(Modal::Validation(c)), Command::Mode(m)) => {
                let mode = ValidationMode::parse(&m).ok_or(CommandError::Invalid {
                    what: "validation mode",
                    value: m,
                })?;
                c.dispatch(ValidationAction::SetMode(mode));
            }
            (Some(Modal::Validation(c)), Command::Validate) => {
                if c.state().loading {
                    return Err(CommandError::Busy("validation"));
                }
                let c = c.clone();
                tokio::spawn(async move {
                    c.validate().await;
                });
            }
            (Some(Modal::Validation(c)), Command::LoadTrade(path)) => {
                let trade = load_trade(&path)?;
                info!(path = %path.display(), "trade loaded for validation");
                c.dispatch(ValidationAction::SetTrade(trade));
            }
            (Some(Modal::Validation(c)), Command::NewTrade) => {
                c.dispatch(ValidationAction::SetTrade(Trade::draft()));
            }
            (Some(Modal::Validation(c)), Command::Clear) => {
                c.clear();
            }

            (_, other) => return Err(CommandError::NotHere(other.name())),
        }
        Ok(())
    }
}
