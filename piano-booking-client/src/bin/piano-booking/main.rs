use core::time::Duration;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use piano_booking_client::availability::SlotAvailability;
use piano_booking_client::error::UPDATE_FAILURE_MESSAGE;
use piano_booking_client::model::{BookingDate, District, LessonType, RecordId};
use piano_booking_client::role::UnknownRole;
use piano_booking_client::{
    BookingApi, BookingConfirmation, ClientError, ConfirmError, FieldDependencyController,
    LocalStore, SelectionError, Session, StoreError, TimeSlot, UserRole,
};
use piano_booking_config::{get_config, ConfigError};
use piano_booking_http::{HttpClient, HttpError};
use piano_booking_telemetry::setup_telemetry;
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "piano-booking")]
#[command(about = "Search free piano room slots and request bookings")]
#[command(
    after_help = "Environment:\n  PIANO_BOOKING_BASE_URL   Backend base url\n  PIANO_BOOKING_ROLE       Account role\n  RUST_LOG                 Log filter"
)]
struct Cli {
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Overrides the configured role.
    #[arg(long, global = true)]
    role: Option<UserRole>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store an auth token for the role.
    Login {
        #[arg(long)]
        token: String,
    },
    /// Forget the stored auth token of the role.
    Logout,
    /// List the students of the signed in account.
    Profile,
    /// Show which time slots can be booked.
    Slots(SelectionArgs),
    /// List the rooms that can host a slot.
    Rooms {
        #[command(flatten)]
        selection: SelectionArgs,
        /// `9:30 AM` or `section1`
        #[arg(long)]
        time: TimeSlot,
    },
    /// Request a booking. Defaults to the first room and studio.
    Book {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long)]
        time: TimeSlot,
        #[arg(long)]
        room: Option<RecordId>,
        #[arg(long)]
        studio: Option<RecordId>,
    },
}

#[derive(Args)]
struct SelectionArgs {
    /// Student id as listed by `profile`.
    #[arg(long)]
    student: RecordId,
    /// 上課, 練琴 or 評估
    #[arg(long = "type")]
    lesson_type: LessonType,
    #[arg(long)]
    district: District,
    /// `YYYY-MM-DD`, defaults to the last picked date.
    #[arg(long)]
    date: Option<BookingDate>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Role(#[from] UnknownRole),
    #[error("{0}")]
    Http(#[from] HttpError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{}", .0.user_message())]
    Client(#[from] ClientError),
    #[error("{0}")]
    Selection(#[from] SelectionError),
    #[error("{0}")]
    Confirm(#[from] ConfirmError),
    #[error("{}: {}", UPDATE_FAILURE_MESSAGE, .0)]
    Update(StoreError),
    #[error("no --date given and no previously picked date stored")]
    MissingDate,
}

struct Context {
    api: BookingApi<HttpClient>,
    session: Session,
    store: LocalStore,
    remark: String,
}

impl Context {
    /// Runs the search form with every field taken from the arguments.
    async fn search(&mut self, args: SelectionArgs) -> Result<FieldDependencyController, CliError> {
        let profile = self.session.profile(&self.api).await?;
        let student = profile
            .student(&args.student)
            .cloned()
            .ok_or(SelectionError::UnknownStudent(args.student))?;
        let date = match args.date {
            Some(date) => {
                self.store.remember_picked_date(date).await?;
                date
            }
            None => self.store.last_picked_date().ok_or(CliError::MissingDate)?,
        };

        let mut controller = FieldDependencyController::new();
        // only the ticket of the last change is worth resolving
        let _ = controller.select_student(student);
        let _ = controller.select_type(args.lesson_type)?;
        let _ = controller.select_district(args.district);
        let ticket = controller.select_date(date);
        controller.refresh(&self.api, &self.session, ticket).await;
        Ok(controller)
    }

    async fn confirmation(
        &mut self,
        args: SelectionArgs,
        time: TimeSlot,
    ) -> Result<BookingConfirmation, CliError> {
        let mut controller = self.search(args).await?;
        controller.select_time(time)?;
        let selection = controller.selection().resolve()?;
        let mut confirmation = BookingConfirmation::new(selection, self.remark.clone());
        confirmation.load_rooms(&self.api, &self.session).await?;
        Ok(confirmation)
    }
}

fn print_rooms(confirmation: &BookingConfirmation) {
    if confirmation.rooms().is_empty() {
        println!("no rooms available");
    }
    for room in confirmation.rooms() {
        println!("{}\t{}\t{}\t{}", room.id, room.name, room.district, room.address);
        for studio in &room.studios {
            println!("  {}\t{}", studio.id, studio.name);
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = get_config()?;
    let role = match cli.role {
        Some(role) => role,
        None => config.role.parse()?,
    };
    debug!(%role, base_url = %config.base_url, "starting");
    let mut store = LocalStore::open(&config.storage_path).await?;
    let session = Session::initialize(role, &store);

    let command = match cli.command {
        Command::Login { token } => {
            let _session = session
                .login_with_token(&mut store, token)
                .await
                .map_err(CliError::Update)?;
            println!("signed in as {role}");
            return Ok(());
        }
        Command::Logout => {
            session.teardown(&mut store).await.map_err(CliError::Update)?;
            println!("signed out as {role}");
            return Ok(());
        }
        command => command,
    };

    let client = HttpClient::new(
        &config.base_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let mut context = Context {
        api: BookingApi::new(client),
        session,
        store,
        remark: config.booking_remark,
    };

    match command {
        Command::Login { .. } | Command::Logout => {}
        Command::Profile => {
            let profile = context.session.profile(&context.api).await?;
            println!("{}", profile.name);
            for student in &profile.students {
                let grade = student.grade.as_deref().unwrap_or("-");
                let types: Vec<&str> = LessonType::options_for(student)
                    .iter()
                    .map(|lesson_type| lesson_type.label())
                    .collect();
                println!("{}\t{}\t{grade}\t{}", student.id, student.name, types.join(" "));
            }
        }
        Command::Slots(args) => {
            let controller = context.search(args).await?;
            match controller.availability() {
                SlotAvailability::DateUnavailable => println!("date is not available"),
                SlotAvailability::Failed | SlotAvailability::NotQueried => {
                    println!("availability unknown, nothing can be picked");
                }
                SlotAvailability::Blocked(_) => {}
            }
            for view in controller.open_time()? {
                let state = if view.enabled { "available" } else { "blocked" };
                println!("{}\t{:>8}\t{state}", view.slot.section_id(), view.slot.label());
            }
        }
        Command::Rooms { selection, time } => {
            let confirmation = context.confirmation(selection, time).await?;
            print_rooms(&confirmation);
        }
        Command::Book {
            selection,
            time,
            room,
            studio,
        } => {
            let mut confirmation = context.confirmation(selection, time).await?;
            if let Some(room) = room {
                confirmation.select_room(&room)?;
            }
            if let Some(studio) = studio {
                confirmation.select_studio(&studio)?;
            }
            let confirmed = confirmation.confirm(&context.api, &context.session).await?;
            println!(
                "requested {} {} in room {} studio {}",
                confirmed.booking.date,
                confirmed.booking.time_slot_section,
                confirmed.booking.room_id,
                confirmed.booking.studio_id,
            );
            println!("{}", confirmed.route);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_telemetry(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:?}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
