use rocket::fairing::AdHoc;

pub mod progress;
pub mod skill_tree;
pub mod types;

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket
            .attach(skill_tree::stage())
            .attach(progress::stage())
    })
}
