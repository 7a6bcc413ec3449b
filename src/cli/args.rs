use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "muwaqqit", version, author, about = "Prayer times, prayer log and reminders in the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save location and calculation settings
    Setup {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Display name for the location
        #[arg(long)]
        name: Option<String>,
        /// Calculation method (e.g. MuslimWorldLeague, Karachi, NorthAmerica)
        #[arg(long)]
        method: Option<String>,
        /// Asr madhab: hanafi or shafi
        #[arg(long)]
        madhab: Option<String>,
        /// UTC offset, e.g. +5, -4, +5:30
        #[arg(long, allow_hyphen_values = true)]
        tz: Option<String>,
    },
    /// Show today's prayer times and countdown to next prayer
    Times {
        /// Recompute today's times instead of using the cached ones
        #[arg(long)]
        refresh: bool,
    },
    /// Show the status of each prayer for a day
    Status {
        /// Date as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Record a prayer (on time by default)
    Mark {
        /// Prayer name (fajr, zuhr, asr, maghrib, isha)
        prayer: String,
        /// Record as prayed late
        #[arg(long, conflicts_with_all = ["missed", "clear"])]
        late: bool,
        /// Record as missed
        #[arg(long, conflicts_with = "clear")]
        missed: bool,
        /// Clear the recorded decision
        #[arg(long)]
        clear: bool,
        /// Date as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Revert the most recent change to the log
    Undo,
    /// Show streaks and on-time percentage
    Stats {
        /// Window for the on-time percentage
        #[arg(long, default_value_t = 7)]
        days: usize,
    },
    /// Clear recorded prayers
    Reset {
        /// Clear today's log only
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        today: bool,
        /// Clear the whole history
        #[arg(long)]
        all: bool,
    },
    /// Reconcile today's reminders and list them
    Remind,
    /// Reminder preferences
    Notify {
        #[command(subcommand)]
        action: NotifyCommands,
    },
    /// Keep running: refresh at midnight and deliver due reminders
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum NotifyCommands {
    /// Set the reminder for one prayer
    Set {
        /// Prayer name
        prayer: String,
        /// Sound: primary (adhan), simple or off
        #[arg(long)]
        sound: Option<String>,
        /// Minutes of advance warning: 0, 10, 15, 20 or 30
        #[arg(long)]
        pre: Option<u32>,
    },
    /// Set quiet hours as HH:MM HH:MM, or turn them off
    Quiet {
        /// Start of quiet hours (HH:MM)
        #[arg(required_unless_present = "off")]
        start: Option<String>,
        /// End of quiet hours (HH:MM)
        #[arg(required_unless_present = "off")]
        end: Option<String>,
        /// Disable quiet hours
        #[arg(long, conflicts_with_all = ["start", "end"])]
        off: bool,
    },
    /// Show reminder preferences
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_flags_parse() {
        let cli = Cli::try_parse_from(["muwaqqit", "mark", "asr", "--late"]).unwrap();
        match cli.command {
            Some(Commands::Mark { prayer, late, missed, clear, date }) => {
                assert_eq!(prayer, "asr");
                assert!(late && !missed && !clear);
                assert!(date.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mark_conflicting_flags_rejected() {
        assert!(Cli::try_parse_from(["muwaqqit", "mark", "asr", "--late", "--missed"]).is_err());
    }

    #[test]
    fn test_reset_requires_a_scope() {
        assert!(Cli::try_parse_from(["muwaqqit", "reset"]).is_err());
        assert!(Cli::try_parse_from(["muwaqqit", "reset", "--all"]).is_ok());
    }

    #[test]
    fn test_setup_accepts_negative_coordinates() {
        let cli =
            Cli::try_parse_from(["muwaqqit", "setup", "--lat", "-33.9", "--lng", "18.4"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Setup { lat, .. }) if lat < 0.0));
    }

    #[test]
    fn test_quiet_off() {
        let cli = Cli::try_parse_from(["muwaqqit", "notify", "quiet", "--off"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Notify { action: NotifyCommands::Quiet { off: true, .. } })
        ));
    }
}
