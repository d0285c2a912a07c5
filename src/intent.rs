//! Parsing of chat input into typed intents.
//!
//! Text messages become an [`Intent`], inline-button payloads a [`Callback`].
//! Both are produced in one step and dispatched with an exhaustive `match`.

/// Commands that take an item name argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCommand {
    Search,
    History,
    Lots,
    Add,
    Remove,
}

impl ItemCommand {
    pub fn name(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::History => "history",
            Self::Lots => "lots",
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start,
    Help,
    Profile,
    Favorites,
    Search(String),
    History(String),
    Lots(String),
    AddFavorite(String),
    RemoveFavorite(String),
    /// An item command sent without the item name.
    MissingArgument(ItemCommand),
    /// Plain text, treated as an implicit search.
    FreeText(String),
    Unknown(String),
}

impl Intent {
    /// Parse a message. Returns `None` for blank text.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let Some(rest) = text.strip_prefix('/') else {
            return Some(Self::FreeText(text.to_string()));
        };

        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.split_whitespace().collect::<Vec<_>>().join(" ")),
            None => (rest, String::new()),
        };
        // `/cmd@botname` is how commands arrive in group chats.
        let command = head.split('@').next().unwrap_or(head).to_lowercase();

        let with_arg = |cmd: ItemCommand, make: fn(String) -> Self| {
            if args.is_empty() {
                Self::MissingArgument(cmd)
            } else {
                make(args.clone())
            }
        };

        Some(match command.as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "profile" => Self::Profile,
            "favorites" => Self::Favorites,
            "search" => with_arg(ItemCommand::Search, Self::Search),
            "history" => with_arg(ItemCommand::History, Self::History),
            "lots" => with_arg(ItemCommand::Lots, Self::Lots),
            "add" => with_arg(ItemCommand::Add, Self::AddFavorite),
            "remove" => with_arg(ItemCommand::Remove, Self::RemoveFavorite),
            _ => Self::Unknown(command),
        })
    }
}

/// Payload carried by an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    MainMenu,
    Profile,
    Favorites,
    Help,
    History(String),
    Lots(String),
    Add(String),
    Remove(String),
}

impl Callback {
    pub fn encode(&self) -> String {
        match self {
            Self::MainMenu => "main_menu".to_string(),
            Self::Profile => "profile".to_string(),
            Self::Favorites => "favorites".to_string(),
            Self::Help => "help".to_string(),
            Self::History(id) => format!("history_{id}"),
            Self::Lots(id) => format!("lots_{id}"),
            Self::Add(id) => format!("add_{id}"),
            Self::Remove(id) => format!("remove_{id}"),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "main_menu" => return Some(Self::MainMenu),
            "profile" => return Some(Self::Profile),
            "favorites" => return Some(Self::Favorites),
            "help" => return Some(Self::Help),
            _ => {}
        }
        let (kind, id) = data.split_once('_')?;
        if id.is_empty() {
            return None;
        }
        let id = id.to_string();
        match kind {
            "history" => Some(Self::History(id)),
            "lots" => Some(Self::Lots(id)),
            "add" => Some(Self::Add(id)),
            "remove" => Some(Self::Remove(id)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_commands() {
        assert_eq!(Intent::parse("/start"), Some(Intent::Start));
        assert_eq!(Intent::parse("/HELP"), Some(Intent::Help));
        assert_eq!(Intent::parse("/profile@stalcraft_bot"), Some(Intent::Profile));
        assert_eq!(Intent::parse(" /favorites "), Some(Intent::Favorites));
    }

    #[test]
    fn item_commands_join_args() {
        assert_eq!(
            Intent::parse("/history  Штрих   М"),
            Some(Intent::History("Штрих М".into()))
        );
        assert_eq!(
            Intent::parse("/add@bot hk417"),
            Some(Intent::AddFavorite("hk417".into()))
        );
        assert_eq!(
            Intent::parse("/remove костюм"),
            Some(Intent::RemoveFavorite("костюм".into()))
        );
        assert_eq!(Intent::parse("/lots x"), Some(Intent::Lots("x".into())));
        assert_eq!(Intent::parse("/search x"), Some(Intent::Search("x".into())));
    }

    #[test]
    fn item_commands_need_args() {
        assert_eq!(
            Intent::parse("/search"),
            Some(Intent::MissingArgument(ItemCommand::Search))
        );
        assert_eq!(
            Intent::parse("/lots   "),
            Some(Intent::MissingArgument(ItemCommand::Lots))
        );
    }

    #[test]
    fn free_text_and_unknown() {
        assert_eq!(Intent::parse("штрих"), Some(Intent::FreeText("штрих".into())));
        assert_eq!(Intent::parse("   "), None);
        assert_eq!(Intent::parse("/dance now"), Some(Intent::Unknown("dance".into())));
    }

    #[test]
    fn callback_round_trip() {
        for cb in [
            Callback::MainMenu,
            Callback::Profile,
            Callback::Favorites,
            Callback::Help,
            Callback::History("y1q9".into()),
            Callback::Lots("y1q9".into()),
            Callback::Add("a_b".into()),
            Callback::Remove("y1q9".into()),
        ] {
            assert_eq!(Callback::parse(&cb.encode()), Some(cb));
        }
    }

    #[test]
    fn callback_rejects_garbage() {
        assert_eq!(Callback::parse("history_"), None);
        assert_eq!(Callback::parse("buy_y1q9"), None);
        assert_eq!(Callback::parse(""), None);
    }
}
