use once_cell::sync::Lazy;
use sovran_symbolmap::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: u64,
    username: String,
    active: bool,
}

const THEMES: [&str; 2] = ["light", "dark"];

// Symbols are defined once and shared by every module that touches the state
static USERS: Lazy<InternalSymbol<Vec<User>>> = Lazy::new(|| {
    InternalSymbol::named(
        "users",
        Downcasting::<Vec<User>>::with_fallback(Vec::new).expect("an empty list is a list"),
    )
});

static THEME: Lazy<ExternalSymbol<String>> = Lazy::new(|| {
    ExternalSymbol::new(
        "config.theme",
        Downcasting::<String>::define(|t| THEMES.contains(&t.as_str()), || "light".to_string())
            .expect("light is a known theme"),
    )
});

static PAGE_VIEWS: Lazy<InternalSymbol<BTreeMap<String, u32>>> = Lazy::new(|| {
    InternalSymbol::named("page_views", Downcasting::<BTreeMap<String, u32>>::to())
});

type AppState = Arc<SymbolContext<SymbolKey>>;

struct UserModule {
    state: AppState,
}

impl UserModule {
    fn add_user(&self, user: User) -> Result<(), MapError> {
        self.state.merge(&*USERS, vec![user], |mut added, mut users| {
            users.append(&mut added);
            Some(users)
        })?;
        Ok(())
    }

    fn deactivate_user(&self, id: u64) -> Result<bool, MapError> {
        let mut found = false;
        self.state.compute_if_present(&*USERS, |_, mut users| {
            for user in users.iter_mut().filter(|u| u.id == id) {
                user.active = false;
                found = true;
            }
            Some(users)
        })?;
        Ok(found)
    }

    fn active_users(&self) -> Result<Vec<String>, MapError> {
        let users = self.state.give(&*USERS)?.unwrap_or_default();
        Ok(users
            .into_iter()
            .filter(|u| u.active)
            .map(|u| u.username)
            .collect())
    }
}

struct ConfigModule {
    state: AppState,
}

impl ConfigModule {
    fn set_theme(&self, theme: &str) -> Result<(), MapError> {
        self.state.set(&*THEME, theme.to_string())?;
        Ok(())
    }

    fn theme(&self) -> Result<String, MapError> {
        self.state.require(&*THEME)
    }
}

struct StatsModule {
    state: AppState,
}

impl StatsModule {
    fn record_page_view(&self, page: &str) -> Result<(), MapError> {
        let visit = BTreeMap::from([(page.to_string(), 1)]);
        self.state.merge(&*PAGE_VIEWS, visit, |visit, mut views| {
            for (page, n) in visit {
                *views.entry(page).or_insert(0) += n;
            }
            Some(views)
        })?;
        Ok(())
    }

    fn total_views(&self) -> Result<u32, MapError> {
        Ok(self
            .state
            .get(&*PAGE_VIEWS)?
            .map_or(0, |views| views.values().sum()))
    }
}

fn main() -> Result<(), MapError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let state: AppState = Arc::new(SymbolContext::new());

    let users = UserModule { state: Arc::clone(&state) };
    let config = ConfigModule { state: Arc::clone(&state) };
    let stats = StatsModule { state: Arc::clone(&state) };

    users.add_user(User { id: 1, username: "alice".to_string(), active: true })?;
    users.add_user(User { id: 2, username: "bob".to_string(), active: true })?;
    users.deactivate_user(2)?;
    println!("active users: {:?}", users.active_users()?);

    println!("theme before config: {}", config.theme()?);
    config.set_theme("dark")?;
    if let Err(e) = config.set_theme("neon") {
        println!("theme refused: {}", e);
    }
    println!("theme: {}", config.theme()?);

    // Page views recorded from several threads at once
    let handles: Vec<_> = ["/", "/about", "/", "/login", "/"]
        .into_iter()
        .map(|page| {
            let stats = StatsModule { state: Arc::clone(&state) };
            thread::spawn(move || stats.record_page_view(page))
        })
        .collect();
    for handle in handles {
        if let Ok(result) = handle.join() {
            result?;
        }
    }
    println!("total views: {}", stats.total_views()?);
    println!("per page: {:?}", state.get(&*PAGE_VIEWS)?);

    // Reporting code gets a view it cannot write through
    let report = state.unmodifiable();
    println!("entries: {}", report.len()?);
    if let Err(e) = report.discard(&*THEME) {
        println!("report view: {}", e);
    }

    Ok(())
}
