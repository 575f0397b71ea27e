use bot_commons::*;

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "WARN,dota_meta_bot=debug");
    }
    start_everything(dota_meta_bot::entry());
}
