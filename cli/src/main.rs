use clap::{Parser, Subcommand};
use lectern::auth::hash_password;
use lectern::model::entity::{
    Course, CourseCreate, LectureCreate, SectionCreate, UserEntity, UserEntityCreateUpdate,
};
use lectern::model::{CrudRepository, DbConnection, ModelManager};
use lectern::web::{AuthenticatedUser, UserRole};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(about = "CLI tool for seeding the course catalog DB", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "student")]
        role: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    Add {
        #[arg(long)]
        instructor: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "Beginner")]
        level: String,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
    },
    List,
    /// Flip the publish flag
    Publish {
        #[arg(long)]
        id: Uuid,
    },
    AddSection {
        #[arg(long)]
        course: Uuid,
        #[arg(long)]
        title: String,
    },
    AddLecture {
        #[arg(long)]
        course: Uuid,
        #[arg(long)]
        section: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long)]
        video_ref: String,
        #[arg(long, default_value_t = 0)]
        duration_minutes: i32,
        #[arg(long, default_value_t = false)]
        is_free: bool,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let database_uri =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for the seeding CLI");
    let db = DbConnection::connect(&database_uri).expect("Unable to connect to database");
    let mm = ModelManager::new(db);
    let admin = AuthenticatedUser::admin();

    match cli.command {
        Commands::User { action } => match action {
            UserCommands::Add {
                username,
                password,
                role,
            } => {
                let hash = hash_password(&password).expect("Unable to hash password");
                let user = UserEntity::create(
                    &mm,
                    &admin,
                    UserEntityCreateUpdate {
                        username,
                        password_hash: hash,
                        role: UserRole::from(role.as_str()).to_string(),
                    },
                )
                .await
                .expect("Unable to create user");
                println!("created user {} ({})", user.username(), user.id());
            }
            UserCommands::List => {
                let users = UserEntity::list(&mm, &admin, 100, 0)
                    .await
                    .expect("Unable to list users");
                for user in users {
                    println!("{}\t{}\t{}", user.id(), user.username(), user.role());
                }
            }
        },
        Commands::Course { action } => match action {
            CourseCommands::Add {
                instructor,
                title,
                description,
                category,
                level,
                price,
            } => {
                let owner = AuthenticatedUser::new(instructor, UserRole::Instructor);
                let course = Course::create(
                    &mm,
                    &owner,
                    CourseCreate {
                        title,
                        description,
                        category,
                        level,
                        price,
                    },
                )
                .await
                .expect("Unable to create course");
                println!("created course {} ({})", course.title(), course.id());
            }
            CourseCommands::List => {
                let courses = Course::list(&mm, &admin, 100, 0)
                    .await
                    .expect("Unable to list courses");
                for course in courses {
                    println!(
                        "{}\t{}\t{}\t{} lectures",
                        course.id(),
                        course.title(),
                        course.status(),
                        course.total_lectures()
                    );
                }
            }
            CourseCommands::Publish { id } => {
                let mut course = Course::find_by_id(&mm, &admin, id)
                    .await
                    .expect("Unable to fetch course")
                    .expect("Course not found");
                course.toggle_publish();
                course.recompute_derived();
                course.save(&mm).await.expect("Unable to save course");
                println!("course {} is now {}", course.id(), course.status());
            }
            CourseCommands::AddSection { course, title } => {
                let mut course = Course::find_by_id(&mm, &admin, course)
                    .await
                    .expect("Unable to fetch course")
                    .expect("Course not found");
                let section_id = course.add_section(SectionCreate { title, order: None });
                course.recompute_derived();
                course.save(&mm).await.expect("Unable to save course");
                println!("added section {section_id}");
            }
            CourseCommands::AddLecture {
                course,
                section,
                title,
                video_ref,
                duration_minutes,
                is_free,
            } => {
                let mut course = Course::find_by_id(&mm, &admin, course)
                    .await
                    .expect("Unable to fetch course")
                    .expect("Course not found");
                let lecture_id = course
                    .add_lecture(
                        section,
                        LectureCreate {
                            title,
                            video_ref,
                            duration_minutes,
                            is_free: Some(is_free),
                            order: None,
                        },
                    )
                    .expect("Section not found");
                course.recompute_derived();
                course.save(&mm).await.expect("Unable to save course");
                println!("added lecture {lecture_id}");
            }
        },
    }
}
