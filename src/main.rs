fn main() {
    std::process::exit(volley::entry::run().as_i32());
}
